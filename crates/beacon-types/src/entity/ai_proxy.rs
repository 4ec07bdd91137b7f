use crate::clock::Clock;
use crate::entity::{Record, record_fields, type_error};
use crate::error::{Error, Result};
use crate::registry::{FieldFlags, FieldSpec, FieldValue, WireModel};
use crate::values::{MetaMap, StringList};

record_fields!(AI_PROXY_FIELDS => [
    FieldSpec::new("meta", "meta", FieldFlags::NONE.skip_if_empty()),
    FieldSpec::new("prompt", "prompt", FieldFlags::NONE),
    FieldSpec::new("past_messages", "past_messages", FieldFlags::NONE.skip_if_empty()),
    FieldSpec::new(
        "past_messages",
        "pastMessages",
        FieldFlags::NONE.skip_if_empty().accommodation(),
    ),
    FieldSpec::new("provider", "provider", FieldFlags::NONE),
]);

/// Proxied AI call. Fire-immediately: never written to the durable cache.
#[derive(Debug, Clone, PartialEq)]
pub struct AiProxy {
    pub base: Record,
    pub meta: MetaMap,
    pub prompt: String,
    pub past_messages: StringList,
    pub provider: String,
}

impl AiProxy {
    pub fn new(
        clock: &Clock,
        prompt: impl Into<String>,
        past_messages: StringList,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            base: Record::new(clock),
            meta: MetaMap::new(),
            prompt: prompt.into(),
            past_messages,
            provider: provider.into(),
        }
    }

    pub fn empty() -> Self {
        Self {
            base: Record::empty(),
            meta: MetaMap::new(),
            prompt: String::new(),
            past_messages: StringList::new(),
            provider: String::new(),
        }
    }
}

impl Default for AiProxy {
    fn default() -> Self {
        Self::empty()
    }
}

impl WireModel for AiProxy {
    fn fields(&self) -> &'static [FieldSpec] {
        AI_PROXY_FIELDS
    }

    fn get(&self, name: &str) -> Option<FieldValue> {
        if let Some(value) = self.base.get_field(name) {
            return Some(value);
        }
        match name {
            "meta" => Some(FieldValue::Map(self.meta.clone())),
            "prompt" => Some(FieldValue::Str(self.prompt.clone())),
            "past_messages" => Some(FieldValue::List(self.past_messages.clone())),
            "provider" => Some(FieldValue::Str(self.provider.clone())),
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
            "prompt" => match value {
                FieldValue::Str(s) => {
                    self.prompt = s;
                    Ok(())
                }
                _ => Err(type_error("prompt", "string")),
            },
            "past_messages" => match value {
                FieldValue::List(list) => {
                    self.past_messages = list;
                    Ok(())
                }
                _ => Err(type_error("past_messages", "list")),
            },
            "provider" => match value {
                FieldValue::Str(s) => {
                    self.provider = s;
                    Ok(())
                }
                _ => Err(type_error("provider", "string")),
            },
            _ => Err(Error::NoSuchField(name.to_string())),
        }
    }
}
