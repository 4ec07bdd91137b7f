use crate::clock::Clock;
use crate::entity::{Record, record_fields, type_error};
use crate::error::Result;
use crate::registry::{FieldFlags, FieldSpec, FieldValue, WireModel};
use crate::values::MetaMap;

record_fields!(EVENT_FIELDS => [
    FieldSpec::new("meta", "meta", FieldFlags::NONE.skip_if_empty()),
    FieldSpec::new("event", "event", FieldFlags::NONE),
    FieldSpec::new("environment", "environment", FieldFlags::NONE),
]);

/// Application-defined occurrence with a name and an environment tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub base: Record,
    pub meta: MetaMap,
    pub event: String,
    pub environment: String,
}

impl Event {
    pub fn new(clock: &Clock, event: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            base: Record::new(clock),
            meta: MetaMap::new(),
            event: event.into(),
            environment: environment.into(),
        }
    }

    pub fn with_meta(mut self, meta: MetaMap) -> Self {
        self.meta = meta;
        self
    }

    /// Blank instance used as the deserialization target.
    pub fn empty() -> Self {
        Self {
            base: Record::empty(),
            meta: MetaMap::new(),
            event: String::new(),
            environment: String::new(),
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::empty()
    }
}

impl WireModel for Event {
    fn fields(&self) -> &'static [FieldSpec] {
        EVENT_FIELDS
    }

    fn get(&self, name: &str) -> Option<FieldValue> {
        if let Some(value) = self.base.get_field(name) {
            return Some(value);
        }
        match name {
            "meta" => Some(FieldValue::Map(self.meta.clone())),
            "event" => Some(FieldValue::Str(self.event.clone())),
            "environment" => Some(FieldValue::Str(self.environment.clone())),
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
            "event" => match value {
                FieldValue::Str(s) => {
                    self.event = s;
                    Ok(())
                }
                _ => Err(type_error("event", "string")),
            },
            "environment" => match value {
                FieldValue::Str(s) => {
                    self.environment = s;
                    Ok(())
                }
                _ => Err(type_error("environment", "string")),
            },
            _ => Err(crate::error::Error::NoSuchField(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_sets_both_timestamps_from_one_instant() {
        let clock = Clock::new();
        let _guard = clock.capture();
        let event = Event::new(&clock, "session_started", "production");

        let parsed = chrono::DateTime::parse_from_rfc3339(&event.base.timestamp).unwrap();
        assert_eq!(parsed.timestamp_millis(), event.base.precise_timestamp);
        assert!(event.base.not_synced);
    }

    #[test]
    fn test_get_and_put_round_trip_own_fields() {
        let clock = Clock::new();
        let mut event = Event::new(&clock, "a", "dev");
        event
            .put("event", FieldValue::Str("b".to_string()))
            .unwrap();
        assert_eq!(event.get("event"), Some(FieldValue::Str("b".to_string())));
    }

    #[test]
    fn test_put_wrong_type_fails() {
        let mut event = Event::empty();
        assert!(event.put("event", FieldValue::Int(3)).is_err());
        assert!(event.put("unknown", FieldValue::Int(3)).is_err());
    }
}
