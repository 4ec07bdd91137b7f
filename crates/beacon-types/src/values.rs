use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque 128-bit record identifier.
///
/// Accepts both canonical hex forms on input (hyphenated UUID and bare
/// 32-character hex); always emits the hyphenated lowercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| Error::Value(format!("Not a 128-bit hex id: '{}'", s)))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Insertion-ordered string-to-string map used for free-form metadata.
///
/// Duplicate keys are last-write-wins; the position of the first insertion
/// is preserved. Besides the JSON object form, the wire accepts a compact
/// comma-separated `k=v` string form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaMap {
    pairs: Vec<(String, String)>,
}

impl MetaMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Compact wire form: `k1=v1,k2=v2`.
    pub fn to_kv_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Render as a JSON object with string values.
    pub fn to_json_object(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (k, v) in &self.pairs {
            obj.insert(k.clone(), serde_json::Value::String(v.clone()));
        }
        serde_json::Value::Object(obj)
    }

    /// Parse a JSON object into the map. Scalar values are stringified;
    /// nested objects and arrays are rejected.
    pub fn from_json_object(value: &serde_json::Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::Value(format!("Not a JSON object: {}", value)))?;
        let mut map = Self::new();
        for (k, v) in obj {
            let text = match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => String::new(),
                other => {
                    return Err(Error::Value(format!(
                        "Map value for '{}' is not a scalar: {}",
                        k, other
                    )));
                }
            };
            map.set(k.clone(), text);
        }
        Ok(map)
    }

    /// Parse the compact `k=v` comma form. Pairs without `=` are rejected.
    pub fn from_kv_string(s: &str) -> Result<Self> {
        let mut map = Self::new();
        for pair in s.split(',').filter(|p| !p.trim().is_empty()) {
            let (k, v) = pair
                .split_once('=')
                .ok_or_else(|| Error::Value(format!("Not a k=v pair: '{}'", pair)))?;
            map.set(k.trim(), v.trim());
        }
        Ok(map)
    }
}

impl FromIterator<(String, String)> for MetaMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

/// Ordered list of strings. The wire accepts a JSON array or a
/// comma-separated string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringList(pub Vec<String>);

impl StringList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_comma_string(s: &str) -> Self {
        Self(
            s.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for StringList {
    fn from(items: Vec<String>) -> Self {
        Self(items)
    }
}

/// Duration with multiple accepted textual forms.
///
/// Input: plain seconds (`"123"`), `HH:MM:SS`, or `D.HH:MM:SS`.
/// Output: total seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireDuration {
    secs: u64,
}

impl WireDuration {
    pub fn from_secs(secs: u64) -> Self {
        Self { secs }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self {
            secs: millis / 1000,
        }
    }

    pub fn as_secs(&self) -> u64 {
        self.secs
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if !s.contains(':') {
            let secs = s
                .parse::<u64>()
                .map_err(|_| Error::Value(format!("Not a duration: '{}'", s)))?;
            return Ok(Self { secs });
        }

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(Error::Value(format!("Not a duration: '{}'", s)));
        }

        // The hours segment may carry a leading day count: D.HH
        let (days, hours_str) = match parts[0].split_once('.') {
            Some((d, h)) => (
                d.parse::<u64>()
                    .map_err(|_| Error::Value(format!("Not a duration: '{}'", s)))?,
                h,
            ),
            None => (0, parts[0]),
        };

        let hours = parse_segment(hours_str, s)?;
        let minutes = parse_segment(parts[1], s)?;
        let seconds = parse_segment(parts[2], s)?;
        if minutes > 59 || seconds > 59 {
            return Err(Error::Value(format!("Not a duration: '{}'", s)));
        }

        Ok(Self {
            secs: days * 86_400 + hours * 3_600 + minutes * 60 + seconds,
        })
    }
}

fn parse_segment(segment: &str, whole: &str) -> Result<u64> {
    segment
        .parse::<u64>()
        .map_err(|_| Error::Value(format!("Not a duration: '{}'", whole)))
}

impl fmt::Display for WireDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.secs)
    }
}

/// Instant carried as epoch milliseconds internally and as an RFC 3339 UTC
/// string on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct WireInstant {
    millis: i64,
}

impl WireInstant {
    pub fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    pub fn parse(s: &str) -> Result<Self> {
        let parsed = DateTime::parse_from_rfc3339(s)
            .map_err(|_| Error::Value(format!("Not a UTC instant: '{}'", s)))?;
        Ok(Self {
            millis: parsed.timestamp_millis(),
        })
    }

    pub fn to_wire(&self) -> String {
        let utc = DateTime::<Utc>::from_timestamp_millis(self.millis)
            .unwrap_or_else(|| DateTime::<Utc>::from_timestamp_millis(0).unwrap());
        utc.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_accepts_both_hex_forms() {
        let hyphenated = RecordId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let bare = RecordId::parse("67e5504410b1426f9247bb680e5fe0c8").unwrap();
        assert_eq!(hyphenated, bare);
        assert_eq!(
            hyphenated.to_string(),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
    }

    #[test]
    fn test_record_id_rejects_garbage() {
        assert!(RecordId::parse("not-an-id").is_err());
    }

    #[test]
    fn test_meta_map_preserves_insertion_order() {
        let mut map = MetaMap::new();
        map.set("b", "1");
        map.set("a", "2");
        map.set("b", "3");

        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(map.get("b"), Some("3"));
    }

    #[test]
    fn test_meta_map_kv_string_round_trip() {
        let mut map = MetaMap::new();
        map.set("lang", "en");
        map.set("tier", "free");

        let compact = map.to_kv_string();
        assert_eq!(compact, "lang=en,tier=free");
        assert_eq!(MetaMap::from_kv_string(&compact).unwrap(), map);
    }

    #[test]
    fn test_meta_map_kv_string_rejects_bare_token() {
        assert!(MetaMap::from_kv_string("lang=en,oops").is_err());
    }

    #[test]
    fn test_string_list_from_comma_string() {
        let list = StringList::from_comma_string("a, b ,,c");
        assert_eq!(list.0, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duration_plain_seconds() {
        assert_eq!(WireDuration::parse("123").unwrap().as_secs(), 123);
    }

    #[test]
    fn test_duration_hms() {
        assert_eq!(WireDuration::parse("01:02:03").unwrap().as_secs(), 3723);
    }

    #[test]
    fn test_duration_days_hms() {
        assert_eq!(
            WireDuration::parse("1.02:03:04").unwrap().as_secs(),
            86_400 + 2 * 3_600 + 3 * 60 + 4
        );
    }

    #[test]
    fn test_duration_rejects_malformed() {
        assert!(WireDuration::parse("1:2").is_err());
        assert!(WireDuration::parse("aa:bb:cc").is_err());
        assert!(WireDuration::parse("00:99:00").is_err());
    }

    #[test]
    fn test_instant_round_trip() {
        let instant = WireInstant::from_millis(1_700_000_000_123);
        let text = instant.to_wire();
        assert_eq!(WireInstant::parse(&text).unwrap(), instant);
    }
}
