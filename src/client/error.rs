use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

/// Enum that represents a [`crate::client::Client`] error
#[derive(Debug, Serialize, Deserialize)]
pub enum Error {
    /// The client could not establish a tcp connection with an rcache node
    /// within the dial timeout.
    UnableToConnect { reason: String },
    /// The server answered, but with something the client could not
    /// interpret as the expected response. Carries whatever the server sent
    /// (usually a serialized server-side error).
    InvalidServerResponse { reason: String },
    /// Generic IO error (automatically converted from [`std::io::Error`])
    Io { reason: String },
    /// The caller misused the client library (like calling connect twice)
    Logic { reason: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io {
            reason: value.to_string(),
        }
    }
}

impl From<crate::error::Error> for Error {
    fn from(value: crate::error::Error) -> Self {
        use crate::error::Error as TopLevelError;
        match value {
            TopLevelError::Io { reason } => Error::Io { reason },
            _ => Self::InvalidServerResponse {
                reason: value.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidServerResponse {
            reason: value.to_string(),
        }
    }
}
