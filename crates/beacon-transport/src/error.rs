use std::fmt;

/// Result type for beacon-transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the transport layer
#[derive(Debug)]
pub enum Error {
    /// Connection, DNS, or timeout failure; retryable
    Network(String),

    /// The body parsed as neither the success nor the failure shape; not
    /// retryable without a server-side fix
    BadResponseShape(String),

    /// Explicit credential rejection
    AuthenticationFailed(String),

    /// The requested remote object does not exist
    NotFound(String),

    /// No credentials have been supplied yet
    NoCredentials,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::BadResponseShape(msg) => write!(f, "Unrecognized response shape: {}", msg),
            Error::AuthenticationFailed(msg) => write!(f, "Authentication failed: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::NoCredentials => write!(f, "No credentials configured"),
        }
    }
}

impl std::error::Error for Error {}
