use serde_json::Value;

use crate::error::Result;
use crate::values::{MetaMap, RecordId, StringList, WireDuration, WireInstant};

/// Behavior flags attached to a registered field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldFlags {
    /// Identifies the record; stripped from backend dumps.
    pub primary_key: bool,
    /// Links to a parent record; stripped from backend dumps.
    pub parent_key: bool,
    /// Alternate wire name accepted on input only, never emitted.
    pub accommodation: bool,
    /// Emit the value as a JSON string even when it is numeric.
    pub string_only: bool,
    /// Omit the key entirely when the value is an empty collection.
    pub skip_if_empty: bool,
    /// Value is a nested object serialized recursively.
    pub child: bool,
    /// Value is a nested array serialized recursively.
    pub child_list: bool,
    /// Never serialized in any category.
    pub exclude: bool,
}

impl FieldFlags {
    pub const NONE: FieldFlags = FieldFlags {
        primary_key: false,
        parent_key: false,
        accommodation: false,
        string_only: false,
        skip_if_empty: false,
        child: false,
        child_list: false,
        exclude: false,
    };

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn parent_key(mut self) -> Self {
        self.parent_key = true;
        self
    }

    pub const fn accommodation(mut self) -> Self {
        self.accommodation = true;
        self
    }

    pub const fn string_only(mut self) -> Self {
        self.string_only = true;
        self
    }

    pub const fn skip_if_empty(mut self) -> Self {
        self.skip_if_empty = true;
        self
    }

    pub const fn child(mut self) -> Self {
        self.child = true;
        self
    }

    pub const fn child_list(mut self) -> Self {
        self.child_list = true;
        self
    }

    pub const fn exclude(mut self) -> Self {
        self.exclude = true;
        self
    }

    pub const fn is_nested(&self) -> bool {
        self.child || self.child_list
    }
}

/// One entry of an entity's static field table.
///
/// A field may appear more than once (accommodation aliases share the same
/// `name`); at most one entry per field is authoritative for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Internal field name, unique per entity apart from aliases.
    pub name: &'static str,
    /// Name used on the wire.
    pub wire: &'static str,
    pub flags: FieldFlags,
}

impl FieldSpec {
    pub const fn new(name: &'static str, wire: &'static str, flags: FieldFlags) -> Self {
        Self { name, wire, flags }
    }
}

/// Field name of the local-only sync flag, stripped from backend dumps by
/// the default visibility predicate.
pub const NOT_SYNCED_FIELD: &str = "not_synced";

/// Runtime value of a registered field.
///
/// The variant doubles as the type witness during deserialization: incoming
/// JSON is coerced to the variant the destination field currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Id(RecordId),
    OptionalId(Option<RecordId>),
    Map(MetaMap),
    List(StringList),
    Duration(WireDuration),
    Instant(WireInstant),
    /// Pre-rendered nested object.
    Child(Value),
    /// Pre-rendered nested array.
    ChildList(Vec<Value>),
}

impl FieldValue {
    /// Name of the variant, used in type-coercion error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Str(_) => "string",
            FieldValue::Int(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Id(_) => "id",
            FieldValue::OptionalId(_) => "optional id",
            FieldValue::Map(_) => "map",
            FieldValue::List(_) => "list",
            FieldValue::Duration(_) => "duration",
            FieldValue::Instant(_) => "instant",
            FieldValue::Child(_) => "child",
            FieldValue::ChildList(_) => "child list",
        }
    }

    /// True for the empty-collection states that `skip_if_empty` omits.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            FieldValue::Str(s) => s.is_empty(),
            FieldValue::Map(m) => m.is_empty(),
            FieldValue::List(l) => l.is_empty(),
            FieldValue::OptionalId(id) => id.is_none(),
            FieldValue::ChildList(items) => items.is_empty(),
            _ => false,
        }
    }
}

/// Registry-driven (de)serialization surface implemented by every wire
/// entity.
pub trait WireModel {
    /// Static field table for this entity type.
    fn fields(&self) -> &'static [FieldSpec];

    /// Read a field by internal name. None when the field is unset.
    fn get(&self, name: &str) -> Option<FieldValue>;

    /// Write a field by internal name.
    fn put(&mut self, name: &str, value: FieldValue) -> Result<()>;

    /// Whether a field is visible in a backend dump. The default strips the
    /// primary key, the parent key, and the local sync flag.
    fn emit_for_backend(&self, spec: &FieldSpec) -> bool {
        !(spec.flags.primary_key || spec.flags.parent_key || spec.name == NOT_SYNCED_FIELD)
    }
}

/// Look up the registry entry matching an incoming wire name.
pub fn find_by_wire<'a>(fields: &'a [FieldSpec], wire: &str) -> Option<&'a FieldSpec> {
    fields.iter().find(|spec| spec.wire == wire)
}

/// Resolve the authoritative (output) entry for a field name.
pub fn authoritative<'a>(fields: &'a [FieldSpec], name: &str) -> Option<&'a FieldSpec> {
    fields
        .iter()
        .find(|spec| spec.name == name && !spec.flags.accommodation)
}

/// Iterate the entries that participate in output, in table order.
pub fn output_fields(fields: &'static [FieldSpec]) -> impl Iterator<Item = &'static FieldSpec> {
    fields
        .iter()
        .filter(|spec| !spec.flags.accommodation && !spec.flags.exclude)
}

#[cfg(test)]
mod tests {
    use super::*;

    static FIELDS: &[FieldSpec] = &[
        FieldSpec::new("id", "id", FieldFlags::NONE.primary_key()),
        FieldSpec::new("display_name", "display_name", FieldFlags::NONE),
        FieldSpec::new(
            "display_name",
            "displayName",
            FieldFlags::NONE.accommodation(),
        ),
        FieldSpec::new("secret", "secret", FieldFlags::NONE.exclude()),
    ];

    #[test]
    fn test_find_by_wire_resolves_aliases() {
        assert_eq!(find_by_wire(FIELDS, "displayName").unwrap().name, "display_name");
        assert!(find_by_wire(FIELDS, "nope").is_none());
    }

    #[test]
    fn test_authoritative_skips_accommodation() {
        let spec = authoritative(FIELDS, "display_name").unwrap();
        assert_eq!(spec.wire, "display_name");
        assert!(!spec.flags.accommodation);
    }

    #[test]
    fn test_output_fields_drop_aliases_and_excluded() {
        let wires: Vec<&str> = output_fields(FIELDS).map(|s| s.wire).collect();
        assert_eq!(wires, vec!["id", "display_name"]);
    }

    #[test]
    fn test_empty_collection_detection() {
        assert!(FieldValue::Map(MetaMap::new()).is_empty_collection());
        assert!(FieldValue::List(StringList::new()).is_empty_collection());
        assert!(!FieldValue::Int(0).is_empty_collection());
    }
}
