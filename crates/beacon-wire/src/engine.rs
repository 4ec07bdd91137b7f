use serde_json::{Map, Number, Value};

use beacon_types::{
    FieldSpec, FieldValue, MetaMap, RecordId, StringList, WireDuration, WireInstant, WireModel,
    find_by_wire, output_fields,
};

use crate::error::{Error, Result};

/// Field-visibility ruleset applied when dumping an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpCategory {
    /// Full local snapshot: every non-excluded field.
    Everything,
    /// Transmission form: additionally consults the entity's per-field
    /// visibility predicate (strips identity and sync bookkeeping).
    ForBackend,
}

/// Render an entity to a wire JSON object.
///
/// Children are emitted as real nested nodes of the value tree; there is no
/// second textual substitution pass.
pub fn dump<T: WireModel + ?Sized>(entity: &T, category: DumpCategory) -> Value {
    let mut obj = Map::new();
    for spec in output_fields(entity.fields()) {
        if category == DumpCategory::ForBackend && !entity.emit_for_backend(spec) {
            continue;
        }
        let Some(value) = entity.get(spec.name) else {
            continue;
        };
        if spec.flags.skip_if_empty && value.is_empty_collection() {
            continue;
        }
        obj.insert(spec.wire.to_string(), render(value, spec));
    }
    Value::Object(obj)
}

fn render(value: FieldValue, spec: &FieldSpec) -> Value {
    let rendered = match value {
        FieldValue::Str(s) => Value::String(s),
        FieldValue::Int(i) => Value::Number(Number::from(i)),
        FieldValue::Float(f) => Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Bool(b) => Value::Bool(b),
        FieldValue::Id(id) => Value::String(id.to_string()),
        FieldValue::OptionalId(Some(id)) => Value::String(id.to_string()),
        FieldValue::OptionalId(None) => Value::Null,
        FieldValue::Map(map) => map.to_json_object(),
        FieldValue::List(list) => Value::Array(
            list.0.into_iter().map(Value::String).collect(),
        ),
        FieldValue::Duration(d) => Value::Number(Number::from(d.as_secs())),
        FieldValue::Instant(t) => Value::String(t.to_wire()),
        FieldValue::Child(node) => node,
        FieldValue::ChildList(items) => Value::Array(items),
    };
    if spec.flags.string_only {
        stringify(rendered)
    } else {
        rendered
    }
}

/// Force a scalar to its string rendering; collections pass through.
fn stringify(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => other,
    }
}

/// Populate an entity from a wire JSON object.
///
/// Top-level keys resolve through the registry by wire name; accommodation
/// aliases route to their primary field, excluded entries are skipped, and
/// anything else unrecognized is an error. Scalars coerce to the runtime
/// type the destination field currently holds.
pub fn load<T: WireModel + ?Sized>(entity: &mut T, value: &Value) -> Result<()> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::NotAnObject(value.to_string()))?;

    for (key, raw) in obj {
        let Some(spec) = find_by_wire(entity.fields(), key).copied() else {
            return Err(Error::UnknownField(key.clone()));
        };
        if spec.flags.exclude {
            continue;
        }

        if spec.flags.child {
            entity.put(spec.name, FieldValue::Child(raw.clone()))?;
            continue;
        }
        if spec.flags.child_list {
            // The backend renders a singleton child list as either a bare
            // object or a one-element array.
            let items = match raw {
                Value::Array(items) => items.clone(),
                Value::Object(_) => vec![raw.clone()],
                other => {
                    return Err(Error::Malformed {
                        field: spec.name.to_string(),
                        message: format!("Expected object or array, got {}", other),
                    });
                }
            };
            entity.put(spec.name, FieldValue::ChildList(items))?;
            continue;
        }

        if raw.is_null() {
            match entity.get(spec.name) {
                Some(FieldValue::OptionalId(_)) => {
                    entity.put(spec.name, FieldValue::OptionalId(None))?;
                }
                _ => {
                    // Null leaves a non-optional field at its current value.
                }
            }
            continue;
        }

        let Some(witness) = entity.get(spec.name) else {
            return Err(Error::UnknownField(key.clone()));
        };
        let coerced = coerce(raw, &witness, &spec)?;
        entity.put(spec.name, coerced)?;
    }

    Ok(())
}

/// Coerce a wire value to the runtime type of the destination field.
fn coerce(raw: &Value, witness: &FieldValue, spec: &FieldSpec) -> Result<FieldValue> {
    let field = spec.name.to_string();
    match witness {
        FieldValue::Str(_) => match raw {
            Value::String(s) => Ok(FieldValue::Str(s.clone())),
            Value::Number(n) => Ok(FieldValue::Str(n.to_string())),
            Value::Bool(b) => Ok(FieldValue::Str(b.to_string())),
            _ => Err(unsupported(raw, field, "string")),
        },
        FieldValue::Int(_) => match raw {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(FieldValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 {
                        Ok(FieldValue::Int(f as i64))
                    } else {
                        Err(unsupported(raw, field, "integer"))
                    }
                } else {
                    Err(unsupported(raw, field, "integer"))
                }
            }
            Value::String(s) => s.parse::<i64>().map(FieldValue::Int).map_err(|_| {
                Error::Malformed {
                    field: spec.name.to_string(),
                    message: format!("Not an integer: '{}'", s),
                }
            }),
            _ => Err(unsupported(raw, field, "integer")),
        },
        FieldValue::Float(_) => match raw {
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Float)
                .ok_or_else(|| unsupported(raw, spec.name.to_string(), "float")),
            Value::String(s) => s.parse::<f64>().map(FieldValue::Float).map_err(|_| {
                Error::Malformed {
                    field: spec.name.to_string(),
                    message: format!("Not a float: '{}'", s),
                }
            }),
            _ => Err(unsupported(raw, field, "float")),
        },
        FieldValue::Bool(_) => match raw {
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::String(s) => match s.as_str() {
                "true" => Ok(FieldValue::Bool(true)),
                "false" => Ok(FieldValue::Bool(false)),
                _ => Err(Error::Malformed {
                    field: spec.name.to_string(),
                    message: format!("Not a boolean: '{}'", s),
                }),
            },
            // A float never coerces to bool; truncation would lose data.
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(FieldValue::Bool(false)),
                Some(1) => Ok(FieldValue::Bool(true)),
                _ => Err(unsupported(raw, field, "boolean")),
            },
            _ => Err(unsupported(raw, field, "boolean")),
        },
        FieldValue::Id(_) | FieldValue::OptionalId(_) => match raw {
            Value::String(s) => {
                let id = RecordId::parse(s).map_err(|e| Error::Malformed {
                    field: spec.name.to_string(),
                    message: e.to_string(),
                })?;
                if matches!(witness, FieldValue::Id(_)) {
                    Ok(FieldValue::Id(id))
                } else {
                    Ok(FieldValue::OptionalId(Some(id)))
                }
            }
            _ => Err(unsupported(raw, field, "id")),
        },
        FieldValue::Map(_) => match raw {
            Value::Object(_) => {
                let map = MetaMap::from_json_object(raw).map_err(|e| Error::Malformed {
                    field: spec.name.to_string(),
                    message: e.to_string(),
                })?;
                Ok(FieldValue::Map(map))
            }
            Value::String(s) => {
                let map = MetaMap::from_kv_string(s).map_err(|e| Error::Malformed {
                    field: spec.name.to_string(),
                    message: e.to_string(),
                })?;
                Ok(FieldValue::Map(map))
            }
            _ => Err(unsupported(raw, field, "map")),
        },
        FieldValue::List(_) => match raw {
            Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => list.push(s.clone()),
                        Value::Number(n) => list.push(n.to_string()),
                        other => {
                            return Err(Error::Malformed {
                                field: spec.name.to_string(),
                                message: format!("List element is not a string: {}", other),
                            });
                        }
                    }
                }
                Ok(FieldValue::List(StringList::from(list)))
            }
            Value::String(s) => Ok(FieldValue::List(StringList::from_comma_string(s))),
            _ => Err(unsupported(raw, field, "list")),
        },
        FieldValue::Duration(_) => match raw {
            Value::Number(n) => n
                .as_u64()
                .map(|secs| FieldValue::Duration(WireDuration::from_secs(secs)))
                .ok_or_else(|| unsupported(raw, spec.name.to_string(), "duration")),
            Value::String(s) => {
                let duration = WireDuration::parse(s).map_err(|e| Error::Malformed {
                    field: spec.name.to_string(),
                    message: e.to_string(),
                })?;
                Ok(FieldValue::Duration(duration))
            }
            _ => Err(unsupported(raw, field, "duration")),
        },
        FieldValue::Instant(_) => match raw {
            Value::String(s) => {
                let instant = WireInstant::parse(s).map_err(|e| Error::Malformed {
                    field: spec.name.to_string(),
                    message: e.to_string(),
                })?;
                Ok(FieldValue::Instant(instant))
            }
            Value::Number(n) => n
                .as_i64()
                .map(|millis| FieldValue::Instant(WireInstant::from_millis(millis)))
                .ok_or_else(|| unsupported(raw, spec.name.to_string(), "instant")),
            _ => Err(unsupported(raw, field, "instant")),
        },
        FieldValue::Child(_) | FieldValue::ChildList(_) => Err(unsupported(raw, field, "child")),
    }
}

fn unsupported(raw: &Value, field: String, to: &'static str) -> Error {
    let from = match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    Error::Unsupported { field, from, to }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::{Clock, Event};
    use serde_json::json;

    #[test]
    fn test_backend_dump_strips_identity_fields() {
        let clock = Clock::new();
        let event = Event::new(&clock, "login", "prod");
        let dumped = dump(&event, DumpCategory::ForBackend);
        let obj = dumped.as_object().unwrap();

        assert!(!obj.contains_key("id"));
        assert!(!obj.contains_key("parent_id"));
        assert!(!obj.contains_key("not_synced"));
        assert_eq!(obj["event"], json!("login"));
    }

    #[test]
    fn test_everything_dump_keeps_identity_fields() {
        let clock = Clock::new();
        let event = Event::new(&clock, "login", "prod");
        let dumped = dump(&event, DumpCategory::Everything);
        let obj = dumped.as_object().unwrap();

        assert!(obj.contains_key("id"));
        assert_eq!(obj["not_synced"], json!(true));
    }

    #[test]
    fn test_empty_meta_is_omitted() {
        let clock = Clock::new();
        let event = Event::new(&clock, "login", "prod");
        let dumped = dump(&event, DumpCategory::Everything);
        assert!(!dumped.as_object().unwrap().contains_key("meta"));
    }

    #[test]
    fn test_load_accepts_camel_case_accommodation() {
        let mut event = Event::empty();
        load(
            &mut event,
            &json!({
                "event": "login",
                "environment": "prod",
                "preciseTimestamp": 1700000000123i64,
            }),
        )
        .unwrap();
        assert_eq!(event.base.precise_timestamp, 1_700_000_000_123);
    }

    #[test]
    fn test_load_rejects_unknown_field() {
        let mut event = Event::empty();
        let err = load(&mut event, &json!({"event": "x", "mystery": 1})).unwrap_err();
        assert!(matches!(err, Error::UnknownField(name) if name == "mystery"));
    }

    #[test]
    fn test_bool_from_float_is_unsupported() {
        let mut event = Event::empty();
        let err = load(&mut event, &json!({"not_synced": 0.5})).unwrap_err();
        assert!(matches!(
            err,
            Error::Unsupported { from: "float", to: "boolean", .. }
        ));
    }

    #[test]
    fn test_bool_from_zero_and_one() {
        let mut event = Event::empty();
        load(&mut event, &json!({"not_synced": 1})).unwrap();
        assert!(event.base.not_synced);
        load(&mut event, &json!({"not_synced": 0})).unwrap();
        assert!(!event.base.not_synced);
    }

    #[test]
    fn test_numeric_string_coerces_to_integer() {
        let mut event = Event::empty();
        load(&mut event, &json!({"precise_timestamp": "42"})).unwrap();
        assert_eq!(event.base.precise_timestamp, 42);
    }

    #[test]
    fn test_meta_accepts_kv_string_form() {
        let mut event = Event::empty();
        load(&mut event, &json!({"meta": "lang=en,tier=free"})).unwrap();
        assert_eq!(event.meta.get("lang"), Some("en"));
        assert_eq!(event.meta.get("tier"), Some("free"));
    }

    #[test]
    fn test_string_only_flag_forces_string_rendering() {
        static SPEC: FieldSpec = FieldSpec::new(
            "n",
            "n",
            beacon_types::FieldFlags::NONE.string_only(),
        );
        assert_eq!(render(FieldValue::Int(42), &SPEC), json!("42"));
        assert_eq!(render(FieldValue::Bool(true), &SPEC), json!("true"));
    }

    // Probe entity covering the duration/instant coercions no production
    // record carries directly.
    #[derive(Default)]
    struct TimingProbe {
        elapsed: WireDuration,
        seen_at: WireInstant,
    }

    static PROBE_FIELDS: &[FieldSpec] = &[
        FieldSpec::new("elapsed", "elapsed", beacon_types::FieldFlags::NONE),
        FieldSpec::new("seen_at", "seen_at", beacon_types::FieldFlags::NONE),
    ];

    impl WireModel for TimingProbe {
        fn fields(&self) -> &'static [FieldSpec] {
            PROBE_FIELDS
        }

        fn get(&self, name: &str) -> Option<FieldValue> {
            match name {
                "elapsed" => Some(FieldValue::Duration(self.elapsed)),
                "seen_at" => Some(FieldValue::Instant(self.seen_at)),
                _ => None,
            }
        }

        fn put(&mut self, name: &str, value: FieldValue) -> beacon_types::Result<()> {
            match (name, value) {
                ("elapsed", FieldValue::Duration(d)) => {
                    self.elapsed = d;
                    Ok(())
                }
                ("seen_at", FieldValue::Instant(t)) => {
                    self.seen_at = t;
                    Ok(())
                }
                (other, _) => Err(beacon_types::Error::NoSuchField(other.to_string())),
            }
        }
    }

    #[test]
    fn test_duration_field_accepts_all_textual_forms() {
        let mut probe = TimingProbe::default();
        load(&mut probe, &json!({"elapsed": "01:02:03"})).unwrap();
        assert_eq!(probe.elapsed.as_secs(), 3723);

        load(&mut probe, &json!({"elapsed": "1.00:00:05"})).unwrap();
        assert_eq!(probe.elapsed.as_secs(), 86_405);

        load(&mut probe, &json!({"elapsed": 42})).unwrap();
        assert_eq!(probe.elapsed.as_secs(), 42);

        assert!(load(&mut probe, &json!({"elapsed": "1:2"})).is_err());
    }

    #[test]
    fn test_instant_field_round_trips_utc_wire_form() {
        let mut probe = TimingProbe::default();
        load(
            &mut probe,
            &json!({"seen_at": "2023-11-14T22:13:20.123Z"}),
        )
        .unwrap();
        assert_eq!(probe.seen_at.as_millis(), 1_700_000_000_123);

        let dumped = dump(&probe, DumpCategory::Everything);
        assert_eq!(dumped["seen_at"], json!("2023-11-14T22:13:20.123Z"));
        assert_eq!(dumped["elapsed"], json!(0));
    }
}
