use crate::clock::Clock;
use crate::entity::{Record, record_fields, type_error};
use crate::error::{Error, Result};
use crate::registry::{FieldFlags, FieldSpec, FieldValue, WireModel};
use crate::values::MetaMap;

record_fields!(TELEMETRY_FIELDS => [
    FieldSpec::new("meta", "meta", FieldFlags::NONE.skip_if_empty()),
    FieldSpec::new("name", "name", FieldFlags::NONE),
]);

/// Named telemetry sample; the measured values travel in the metadata map.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub base: Record,
    pub meta: MetaMap,
    pub name: String,
}

impl Telemetry {
    pub fn new(clock: &Clock, name: impl Into<String>) -> Self {
        Self {
            base: Record::new(clock),
            meta: MetaMap::new(),
            name: name.into(),
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
            name: String::new(),
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::empty()
    }
}

impl WireModel for Telemetry {
    fn fields(&self) -> &'static [FieldSpec] {
        TELEMETRY_FIELDS
    }

    fn get(&self, name: &str) -> Option<FieldValue> {
        if let Some(value) = self.base.get_field(name) {
            return Some(value);
        }
        match name {
            "meta" => Some(FieldValue::Map(self.meta.clone())),
            "name" => Some(FieldValue::Str(self.name.clone())),
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
            "name" => match value {
                FieldValue::Str(s) => {
                    self.name = s;
                    Ok(())
                }
                _ => Err(type_error("name", "string")),
            },
            _ => Err(Error::NoSuchField(name.to_string())),
        }
    }
}
