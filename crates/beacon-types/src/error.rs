use std::fmt;

/// Result type for beacon-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the types layer
#[derive(Debug)]
pub enum Error {
    /// A field was assigned a value of the wrong runtime type
    FieldType {
        field: &'static str,
        expected: &'static str,
    },

    /// No field with the given name is registered for the entity
    NoSuchField(String),

    /// A value failed to parse into one of the richer value types
    Value(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FieldType { field, expected } => {
                write!(f, "Field '{}' expects a {} value", field, expected)
            }
            Error::NoSuchField(name) => write!(f, "No registered field named '{}'", name),
            Error::Value(msg) => write!(f, "Value error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
