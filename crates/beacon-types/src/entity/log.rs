use std::fmt;

use crate::clock::Clock;
use crate::entity::{Record, record_fields, type_error};
use crate::error::{Error, Result};
use crate::registry::{FieldFlags, FieldSpec, FieldValue, WireModel};
use crate::values::MetaMap;

record_fields!(LOG_FIELDS => [
    FieldSpec::new("meta", "meta", FieldFlags::NONE.skip_if_empty()),
    FieldSpec::new("level", "level", FieldFlags::NONE),
    FieldSpec::new("text", "text", FieldFlags::NONE),
]);

/// Severity of a collected log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::Value(format!("Unknown log level: '{}'", other))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application log line captured for collection.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub base: Record,
    pub meta: MetaMap,
    pub level: LogLevel,
    pub text: String,
}

impl LogEntry {
    pub fn new(clock: &Clock, level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            base: Record::new(clock),
            meta: MetaMap::new(),
            level,
            text: text.into(),
        }
    }

    pub fn with_meta(mut self, meta: MetaMap) -> Self {
        self.meta = meta;
        self
    }

    pub fn empty() -> Self {
        Self {
            base: Record::empty(),
            meta: MetaMap::new(),
            level: LogLevel::Info,
            text: String::new(),
        }
    }
}

impl Default for LogEntry {
    fn default() -> Self {
        Self::empty()
    }
}

impl WireModel for LogEntry {
    fn fields(&self) -> &'static [FieldSpec] {
        LOG_FIELDS
    }

    fn get(&self, name: &str) -> Option<FieldValue> {
        if let Some(value) = self.base.get_field(name) {
            return Some(value);
        }
        match name {
            "meta" => Some(FieldValue::Map(self.meta.clone())),
            "level" => Some(FieldValue::Str(self.level.as_str().to_string())),
            "text" => Some(FieldValue::Str(self.text.clone())),
            _ => None,
        }
    }

    fn put(&mut self, name: &str, value: FieldValue) -> Result<()> {
        if let Some(result) = self.base.put_field(name, value.clone()) {
            return result;
        }
        match name {
            "meta" => match value {
                FieldValue::Map(map) => {
                    self.meta = map;
                    Ok(())
                }
                _ => Err(type_error("meta", "map")),
            },
            "level" => match value {
                FieldValue::Str(s) => {
                    self.level = LogLevel::parse(&s)?;
                    Ok(())
                }
                _ => Err(type_error("level", "string")),
            },
            "text" => match value {
                FieldValue::Str(s) => {
                    self.text = s;
                    Ok(())
                }
                _ => Err(type_error("text", "string")),
            },
            _ => Err(Error::NoSuchField(name.to_string())),
        }
    }
}
