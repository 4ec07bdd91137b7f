use serde_json::Value;

use crate::clock::Clock;
use crate::entity::{Record, record_fields, type_error};
use crate::error::{Error, Result};
use crate::registry::{FieldFlags, FieldSpec, FieldValue, WireModel};
use crate::values::{MetaMap, StringList};

record_fields!(STORAGE_FIELDS => [
    FieldSpec::new("name", "name", FieldFlags::NONE),
    FieldSpec::new("keep_policy", "keep_policy", FieldFlags::NONE),
    FieldSpec::new("keep_policy", "keepPolicy", FieldFlags::NONE.accommodation()),
    FieldSpec::new("origin", "origin", FieldFlags::NONE),
    FieldSpec::new("persistent", "persistent", FieldFlags::NONE),
    FieldSpec::new("tags", "tags", FieldFlags::NONE.skip_if_empty()),
    FieldSpec::new("payload", "payload", FieldFlags::NONE.child_list()),
]);

/// Write policy for a stored entry: replace the single record or accumulate
/// a history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepPolicy {
    KeepLatest,
    AppendHistory,
}

impl KeepPolicy {
    pub fn as_wire(&self) -> &'static str {
        match self {
            KeepPolicy::KeepLatest => "keepLatest",
            KeepPolicy::AppendHistory => "appendHistory",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "keepLatest" => Ok(KeepPolicy::KeepLatest),
            "appendHistory" => Ok(KeepPolicy::AppendHistory),
            other => Err(Error::Value(format!("Unknown keep policy: '{}'", other))),
        }
    }
}

/// Visibility scope of a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    /// Tied to the device, readable without a signed-in user.
    Device,
    /// Tied to the signed-in user identity.
    User,
}

impl StorageScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageScope::Device => "device",
            StorageScope::User => "user",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "device" => Ok(StorageScope::Device),
            "user" => Ok(StorageScope::User),
            other => Err(Error::Value(format!("Unknown storage scope: '{}'", other))),
        }
    }
}

/// Single-element holder for a storage payload.
///
/// The backend represents a singleton as either a bare object or a
/// one-element array; after parse the list form always holds exactly one
/// element.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadContainer {
    items: Vec<MetaMap>,
}

impl PayloadContainer {
    pub fn new(payload: MetaMap) -> Self {
        Self {
            items: vec![payload],
        }
    }

    pub fn payload(&self) -> &MetaMap {
        &self.items[0]
    }

    pub fn into_payload(mut self) -> MetaMap {
        self.items.remove(0)
    }

    pub(crate) fn to_wire_items(&self) -> Vec<Value> {
        self.items.iter().map(MetaMap::to_json_object).collect()
    }

    pub(crate) fn from_wire_items(items: Vec<Value>) -> Result<Self> {
        if items.len() != 1 {
            return Err(Error::Value(format!(
                "Payload container expects exactly one element, got {}",
                items.len()
            )));
        }
        let payload = MetaMap::from_json_object(&items[0])?;
        Ok(Self {
            items: vec![payload],
        })
    }
}

/// Named key-value record synchronized between local and remote storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEntry {
    pub base: Record,
    pub name: String,
    pub keep_policy: KeepPolicy,
    pub origin: String,
    /// True for entries that outlive the session.
    pub persistent: bool,
    pub tags: StringList,
    pub container: PayloadContainer,
}

impl StorageEntry {
    pub fn new(
        clock: &Clock,
        name: impl Into<String>,
        keep_policy: KeepPolicy,
        payload: MetaMap,
    ) -> Self {
        Self {
            base: Record::new(clock),
            name: name.into(),
            keep_policy,
            origin: String::new(),
            persistent: true,
            tags: StringList::new(),
            container: PayloadContainer::new(payload),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn empty() -> Self {
        Self {
            base: Record::empty(),
            name: String::new(),
            keep_policy: KeepPolicy::KeepLatest,
            origin: String::new(),
            persistent: true,
            tags: StringList::new(),
            container: PayloadContainer::new(MetaMap::new()),
        }
    }
}

impl Default for StorageEntry {
    fn default() -> Self {
        Self::empty()
    }
}

impl WireModel for StorageEntry {
    fn fields(&self) -> &'static [FieldSpec] {
        STORAGE_FIELDS
    }

    fn get(&self, name: &str) -> Option<FieldValue> {
        if let Some(value) = self.base.get_field(name) {
            return Some(value);
        }
        match name {
            "name" => Some(FieldValue::Str(self.name.clone())),
            "keep_policy" => Some(FieldValue::Str(self.keep_policy.as_wire().to_string())),
            "origin" => Some(FieldValue::Str(self.origin.clone())),
            "persistent" => Some(FieldValue::Bool(self.persistent)),
            "tags" => Some(FieldValue::List(self.tags.clone())),
            "payload" => Some(FieldValue::ChildList(self.container.to_wire_items())),
            _ => None,
        }
    }

    fn put(&mut self, name: &str, value: FieldValue) -> Result<()> {
        if let Some(result) = self.base.put_field(name, value.clone()) {
            return result;
        }
        match name {
            "name" => match value {
                FieldValue::Str(s) => {
                    self.name = s;
                    Ok(())
                }
                _ => Err(type_error("name", "string")),
            },
            "keep_policy" => match value {
                FieldValue::Str(s) => {
                    self.keep_policy = KeepPolicy::parse(&s)?;
                    Ok(())
                }
                _ => Err(type_error("keep_policy", "string")),
            },
            "origin" => match value {
                FieldValue::Str(s) => {
                    self.origin = s;
                    Ok(())
                }
                _ => Err(type_error("origin", "string")),
            },
            "persistent" => match value {
                FieldValue::Bool(flag) => {
                    self.persistent = flag;
                    Ok(())
                }
                _ => Err(type_error("persistent", "boolean")),
            },
            "tags" => match value {
                FieldValue::List(list) => {
                    self.tags = list;
                    Ok(())
                }
                _ => Err(type_error("tags", "list")),
            },
            "payload" => match value {
                FieldValue::ChildList(items) => {
                    self.container = PayloadContainer::from_wire_items(items)?;
                    Ok(())
                }
                _ => Err(type_error("payload", "child list")),
            },
            _ => Err(Error::NoSuchField(name.to_string())),
        }
    }
}
