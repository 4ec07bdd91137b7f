use std::fmt;

/// Result type for beacon-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the session/runtime layer
#[derive(Debug)]
pub enum Error {
    /// Local persistence layer failure
    Database(beacon_store::Error),

    /// Transport layer error
    Transport(beacon_transport::Error),

    /// Requested storage entry does not exist locally or remotely
    NotFound(String),

    /// Operation is not valid in the current authentication state
    InvalidState(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => write!(f, "Database error: {}", err),
            Error::Transport(err) => write!(f, "Transport error: {}", err),
            Error::NotFound(name) => write!(f, "Storage entry not found: {}", name),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Transport(err) => Some(err),
            Error::NotFound(_) | Error::InvalidState(_) => None,
        }
    }
}

impl From<beacon_store::Error> for Error {
    fn from(err: beacon_store::Error) -> Self {
        Error::Database(err)
    }
}

impl From<beacon_transport::Error> for Error {
    fn from(err: beacon_transport::Error) -> Self {
        Error::Transport(err)
    }
}
