//! Commands accepted by an rcache server.
//!
//! Every command knows how to construct itself from a [`Message`] and how to
//! execute against the local [`CacheNode`]. Responses (and errors) are
//! serialized back into a [`Message`] carrying the same id as the request.
pub mod cluster;
pub mod delete;
pub mod ping;
pub mod replicate;
pub mod retrieve;
pub mod store;
pub mod types;

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{event, Level};

use crate::cache::CacheNode;
use crate::error::{Error, InvalidRequest, Result};
use crate::server::message::Message;

pub const PING_CMD: u32 = 1;
pub const STORE_CMD: u32 = 2;
pub const RETRIEVE_CMD: u32 = 3;
pub const DELETE_CMD: u32 = 4;
pub const REPLICATE_CMD: u32 = 5;
pub const CLUSTER_HEARTBEAT_CMD: u32 = 101;
pub const CLUSTER_JOIN_CMD: u32 = 102;
pub const CLUSTER_STATE_CMD: u32 = 103;

/// Command definition - this enum contains all commands an rcache node can
/// execute.
pub enum Command {
    Ping(ping::Ping),
    Store(store::Store),
    Retrieve(retrieve::Retrieve),
    Delete(delete::Delete),
    Replicate(replicate::Replicate),
    Heartbeat(cluster::heartbeat::Heartbeat),
    JoinCluster(cluster::join::JoinCluster),
    ClusterState(cluster::cluster_state::ClusterState),
}

impl Command {
    /// Executes the given [`Command`] and returns the response message, with
    /// any execution error serialized into the payload.
    pub async fn execute(self, node: Arc<CacheNode>) -> Message {
        match self {
            Command::Ping(cmd) => serialize_response(PING_CMD, cmd.execute().await),
            Command::Store(cmd) => serialize_response(STORE_CMD, cmd.execute(node).await),
            Command::Retrieve(cmd) => serialize_response(RETRIEVE_CMD, cmd.execute(node).await),
            Command::Delete(cmd) => serialize_response(DELETE_CMD, cmd.execute(node).await),
            Command::Replicate(cmd) => serialize_response(REPLICATE_CMD, cmd.execute(node).await),
            Command::Heartbeat(cmd) => {
                serialize_response(CLUSTER_HEARTBEAT_CMD, cmd.execute(node).await)
            }
            Command::JoinCluster(cmd) => {
                serialize_response(CLUSTER_JOIN_CMD, cmd.execute(node).await)
            }
            Command::ClusterState(cmd) => {
                serialize_response(CLUSTER_STATE_CMD, cmd.execute(node).await)
            }
        }
    }

    /// Tries to construct a [`Command`] out of the provided [`Message`]
    pub fn try_from_message(message: Message) -> Result<Command> {
        match message.id {
            PING_CMD => Ok(Command::Ping(ping::Ping)),
            STORE_CMD => Ok(Command::Store(store::Store::try_from_message(message)?)),
            RETRIEVE_CMD => Ok(Command::Retrieve(retrieve::Retrieve::try_from_message(
                message,
            )?)),
            DELETE_CMD => Ok(Command::Delete(delete::Delete::try_from_message(message)?)),
            REPLICATE_CMD => Ok(Command::Replicate(replicate::Replicate::try_from_message(
                message,
            )?)),
            CLUSTER_HEARTBEAT_CMD => Ok(Command::Heartbeat(
                cluster::heartbeat::Heartbeat::try_from_message(message)?,
            )),
            CLUSTER_JOIN_CMD => Ok(Command::JoinCluster(
                cluster::join::JoinCluster::try_from_message(message)?,
            )),
            CLUSTER_STATE_CMD => Ok(Command::ClusterState(
                cluster::cluster_state::ClusterState,
            )),
            _ => {
                event!(Level::WARN, "Unrecognized command: {}", message.id);
                Err(Error::InvalidRequest(InvalidRequest::UnrecognizedCommand {
                    id: message.id,
                }))
            }
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            Command::Ping(_) => PING_CMD,
            Command::Store(_) => STORE_CMD,
            Command::Retrieve(_) => RETRIEVE_CMD,
            Command::Delete(_) => DELETE_CMD,
            Command::Replicate(_) => REPLICATE_CMD,
            Command::Heartbeat(_) => CLUSTER_HEARTBEAT_CMD,
            Command::JoinCluster(_) => CLUSTER_JOIN_CMD,
            Command::ClusterState(_) => CLUSTER_STATE_CMD,
        }
    }
}

pub(crate) fn serialize_response<T: Serialize>(id: u32, result: Result<T>) -> Message {
    let payload = match &result {
        Ok(response) => serde_json::to_vec(response),
        Err(err) => serde_json::to_vec(err),
    };
    match payload {
        Ok(serialized) => Message::new(id, Some(Bytes::from(serialized))),
        Err(err) => {
            event!(Level::ERROR, "Unable to serialize response: {}", err);
            Message::new(id, None)
        }
    }
}

/// Constructs a command struct from a [`Message`], validating the message id
/// and deserializing the json payload.
macro_rules! try_from_message_with_payload {
    ($message:expr, $id:expr, $t:ty) => {{
        if $message.id != $id {
            return Err(crate::error::Error::InvalidRequest(
                crate::error::InvalidRequest::UnableToConstructCommandFromMessage {
                    expected_id: $id,
                    got: $message.id,
                },
            ));
        }

        match $message.payload {
            Some(ref payload) => {
                let cmd: $t = serde_json::from_slice(payload).map_err(|err| {
                    crate::error::Error::InvalidRequest(
                        crate::error::InvalidRequest::InvalidJsonPayload(err.to_string()),
                    )
                })?;
                Ok(cmd)
            }
            None => Err(crate::error::Error::InvalidRequest(
                crate::error::InvalidRequest::EmptyMessagePayload,
            )),
        }
    }};
}

pub(crate) use try_from_message_with_payload;
