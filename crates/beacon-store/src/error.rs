use std::fmt;

/// Result type for beacon-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the local cache layer
#[derive(Debug)]
pub enum Error {
    /// Underlying database failure
    Database(rusqlite::Error),

    /// Stored payload failed to parse back
    Corrupt(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => write!(f, "Database error: {}", err),
            Error::Corrupt(msg) => write!(f, "Corrupt cache payload: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Corrupt(_) => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}
