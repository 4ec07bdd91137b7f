mod ai_proxy;
mod event;
mod log;
mod module;
mod storage;
mod telemetry;

pub use ai_proxy::AiProxy;
pub use event::Event;
pub use log::{LogEntry, LogLevel};
pub use module::ModuleTarget;
pub use storage::{KeepPolicy, PayloadContainer, StorageEntry, StorageScope};
pub use telemetry::Telemetry;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::registry::FieldValue;
use crate::values::RecordId;

/// Identity and timing carried by every wire entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub parent_id: Option<RecordId>,
    /// Human-readable UTC form of the construction instant.
    pub timestamp: String,
    /// Grouping value in epoch milliseconds, set from the same instant as
    /// `timestamp` and never re-derived from it.
    pub precise_timestamp: i64,
    /// True while the record exists only locally.
    pub not_synced: bool,
}

impl Record {
    pub fn new(clock: &Clock) -> Self {
        let instant = clock.now();
        Self {
            id: RecordId::generate(),
            parent_id: None,
            timestamp: instant.text,
            precise_timestamp: instant.millis,
            not_synced: true,
        }
    }

    /// Blank record used as the deserialization target.
    pub fn empty() -> Self {
        Self {
            id: RecordId::generate(),
            parent_id: None,
            timestamp: String::new(),
            precise_timestamp: 0,
            not_synced: false,
        }
    }

    pub(crate) fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::Id(self.id)),
            "parent_id" => Some(FieldValue::OptionalId(self.parent_id)),
            "timestamp" => Some(FieldValue::Str(self.timestamp.clone())),
            "precise_timestamp" => Some(FieldValue::Int(self.precise_timestamp)),
            "not_synced" => Some(FieldValue::Bool(self.not_synced)),
            _ => None,
        }
    }

    /// Write a base field. Returns None when the name is not a base field so
    /// the entity can try its own fields.
    pub(crate) fn put_field(&mut self, name: &str, value: FieldValue) -> Option<Result<()>> {
        match name {
            "id" => Some(match value {
                FieldValue::Id(id) => {
                    self.id = id;
                    Ok(())
                }
                _ => Err(type_error("id", "id")),
            }),
            "parent_id" => Some(match value {
                FieldValue::OptionalId(id) => {
                    self.parent_id = id;
                    Ok(())
                }
                FieldValue::Id(id) => {
                    self.parent_id = Some(id);
                    Ok(())
                }
                _ => Err(type_error("parent_id", "id")),
            }),
            "timestamp" => Some(match value {
                FieldValue::Str(s) => {
                    self.timestamp = s;
                    Ok(())
                }
                _ => Err(type_error("timestamp", "string")),
            }),
            "precise_timestamp" => Some(match value {
                FieldValue::Int(millis) => {
                    self.precise_timestamp = millis;
                    Ok(())
                }
                _ => Err(type_error("precise_timestamp", "integer")),
            }),
            "not_synced" => Some(match value {
                FieldValue::Bool(flag) => {
                    self.not_synced = flag;
                    Ok(())
                }
                _ => Err(type_error("not_synced", "boolean")),
            }),
            _ => None,
        }
    }
}

pub(crate) fn type_error(field: &'static str, expected: &'static str) -> Error {
    Error::FieldType { field, expected }
}

/// Base registry entries shared by every record type, followed by the
/// entity's own entries. camelCase aliases are input-only accommodations.
macro_rules! record_fields {
    ($table:ident => [$($extra:expr),* $(,)?]) => {
        static $table: &[$crate::registry::FieldSpec] = &[
            $crate::registry::FieldSpec::new(
                "id",
                "id",
                $crate::registry::FieldFlags::NONE.primary_key(),
            ),
            $crate::registry::FieldSpec::new(
                "parent_id",
                "parent_id",
                $crate::registry::FieldFlags::NONE.parent_key(),
            ),
            $crate::registry::FieldSpec::new(
                "parent_id",
                "parentId",
                $crate::registry::FieldFlags::NONE.parent_key().accommodation(),
            ),
            $crate::registry::FieldSpec::new(
                "timestamp",
                "timestamp",
                $crate::registry::FieldFlags::NONE,
            ),
            $crate::registry::FieldSpec::new(
                "precise_timestamp",
                "precise_timestamp",
                $crate::registry::FieldFlags::NONE,
            ),
            $crate::registry::FieldSpec::new(
                "precise_timestamp",
                "preciseTimestamp",
                $crate::registry::FieldFlags::NONE.accommodation(),
            ),
            $crate::registry::FieldSpec::new(
                "not_synced",
                "not_synced",
                $crate::registry::FieldFlags::NONE,
            ),
            $crate::registry::FieldSpec::new(
                "not_synced",
                "notSynced",
                $crate::registry::FieldFlags::NONE.accommodation(),
            ),
            $($extra),*
        ];
    };
}

pub(crate) use record_fields;
