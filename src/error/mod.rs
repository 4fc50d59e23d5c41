//! This module defines the errors that rcache can return to callers.
//!
//! Errors are serializable so that command handlers can ship them back to the
//! remote side of a connection as a JSON payload.
use std::fmt::Display;

use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

/// Error enum with all possible variants
#[derive(Debug, Serialize)]
pub enum Error {
    InvalidRequest(InvalidRequest),
    InvalidServerConfig { reason: String },
    Io { reason: String },
    Logic { reason: String },
    Store(crate::store::Error),
    Cluster(crate::cluster::error::Error),
    Client(crate::client::error::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

impl From<crate::store::Error> for Error {
    fn from(err: crate::store::Error) -> Self {
        Self::Store(err)
    }
}

impl From<crate::cluster::error::Error> for Error {
    fn from(err: crate::cluster::error::Error) -> Self {
        Self::Cluster(err)
    }
}

impl From<crate::client::error::Error> for Error {
    fn from(err: crate::client::error::Error) -> Self {
        Self::Client(err)
    }
}

#[derive(Debug, Serialize)]
pub enum InvalidRequest {
    MaxMessageSizeExceeded { max: u32, got: u32 },
    MessageReceivedWithoutRequestId,
    MessageRequestIdMustBeUtf8Encoded,
    UnableToConstructCommandFromMessage { expected_id: u32, got: u32 },
    InvalidJsonPayload(String),
    EmptyMessagePayload,
    UnrecognizedCommand { id: u32 },
    /// A cluster command hit a server running in standalone mode.
    NotInClusterMode,
}
