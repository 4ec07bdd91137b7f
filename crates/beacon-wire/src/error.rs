use std::fmt;

/// Result type for beacon-wire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while converting entities to and from wire
/// JSON
#[derive(Debug)]
pub enum Error {
    /// The incoming document is not a JSON object
    NotAnObject(String),

    /// A top-level key matches no registered wire name
    UnknownField(String),

    /// The coercion between the wire value and the field's runtime type is
    /// not defined
    Unsupported {
        field: String,
        from: &'static str,
        to: &'static str,
    },

    /// The wire value has the right shape class but fails to parse
    Malformed { field: String, message: String },

    /// Field assignment rejected by the entity
    Field(beacon_types::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotAnObject(got) => write!(f, "Expected a JSON object, got {}", got),
            Error::UnknownField(name) => write!(f, "Unknown wire field '{}'", name),
            Error::Unsupported { field, from, to } => {
                write!(f, "Field '{}': cannot coerce {} to {}", field, from, to)
            }
            Error::Malformed { field, message } => {
                write!(f, "Field '{}': {}", field, message)
            }
            Error::Field(err) => write!(f, "Field assignment failed: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Field(err) => Some(err),
            _ => None,
        }
    }
}

impl From<beacon_types::Error> for Error {
    fn from(err: beacon_types::Error) -> Self {
        Error::Field(err)
    }
}
