//! The TCP [`Client`] used by build tools and by rcache nodes talking to
//! each other.
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Duration;

use super::error::{Error, Result};
use super::{Client, Factory};
use crate::cluster::gossip::Peer;
use crate::cmd::cluster::cluster_state::{ClusterState, ClusterStateResponse};
use crate::cmd::cluster::heartbeat::{Heartbeat, HeartbeatResponse};
use crate::cmd::cluster::join::{JoinCluster, JoinResponse};
use crate::cmd::delete::{Delete, DeleteResponse};
use crate::cmd::ping::{Ping, PingResponse};
use crate::cmd::replicate::{Replicate, ReplicateResponse};
use crate::cmd::retrieve::{Retrieve, RetrieveResponse};
use crate::cmd::store::{Store, StoreResponse};
use crate::server::message::{IntoMessage, Message};

/// How long to wait for a TCP connection before declaring the node
/// unreachable. Keeps joins against dead seeds from hanging forever.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug)]
struct Connection {
    stream: TcpStream,
}

impl Connection {
    /// Writes one request frame and reads one response frame.
    async fn request(&mut self, message: Message) -> Result<Message> {
        self.stream.write_all(&message.serialize()).await?;
        Ok(Message::try_from_async_read(&mut self.stream).await?)
    }
}

#[derive(Debug)]
enum CacheClientState {
    Disconnected { address: String },
    Connected { connection: Connection },
}

#[derive(Debug)]
pub struct CacheClient {
    state: CacheClientState,
}

impl CacheClient {
    pub fn new(address: String) -> Self {
        Self {
            state: CacheClientState::Disconnected { address },
        }
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        match &mut self.state {
            CacheClientState::Connected { connection } => Ok(connection),
            CacheClientState::Disconnected { .. } => Err(Error::Logic {
                reason: "connect() must be called before issuing requests".to_string(),
            }),
        }
    }

    async fn request<T: DeserializeOwned>(&mut self, cmd: &impl IntoMessage) -> Result<T> {
        let response = self.connection()?.request(Message::from(cmd)).await?;
        parse_response(response)
    }
}

/// Deserializes the expected response type out of a response [`Message`].
/// A payload that doesn't parse as `T` is a serialized server-side error,
/// which we surface verbatim.
fn parse_response<T: DeserializeOwned>(message: Message) -> Result<T> {
    let payload = message.payload.ok_or_else(|| Error::InvalidServerResponse {
        reason: "response without payload".to_string(),
    })?;
    serde_json::from_slice(&payload).map_err(|_| Error::InvalidServerResponse {
        reason: String::from_utf8_lossy(&payload).to_string(),
    })
}

#[async_trait]
impl Client for CacheClient {
    async fn connect(&mut self) -> Result<()> {
        match &self.state {
            CacheClientState::Connected { .. } => Err(Error::Logic {
                reason: "client is already connected".to_string(),
            }),
            CacheClientState::Disconnected { address } => {
                let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
                    .await
                    .map_err(|_| Error::UnableToConnect {
                        reason: format!("timed out dialing {}", address),
                    })?
                    .map_err(|err| Error::UnableToConnect {
                        reason: err.to_string(),
                    })?;
                self.state = CacheClientState::Connected {
                    connection: Connection { stream },
                };
                Ok(())
            }
        }
    }

    async fn ping(&mut self) -> Result<PingResponse> {
        self.request(&Ping).await
    }

    async fn store(&mut self, cmd: Store) -> Result<StoreResponse> {
        self.request(&cmd).await
    }

    async fn retrieve(&mut self, cmd: Retrieve) -> Result<RetrieveResponse> {
        self.request(&cmd).await
    }

    async fn delete(&mut self, cmd: Delete) -> Result<DeleteResponse> {
        self.request(&cmd).await
    }

    async fn replicate(&mut self, cmd: Replicate) -> Result<ReplicateResponse> {
        self.request(&cmd).await
    }

    async fn join_cluster(&mut self, name: String, address: String) -> Result<JoinResponse> {
        self.request(&JoinCluster::new(name, address)).await
    }

    async fn heartbeat(&mut self, peers: Vec<Peer>) -> Result<HeartbeatResponse> {
        self.request(&Heartbeat::new(peers)).await
    }

    async fn cluster_state(&mut self) -> Result<ClusterStateResponse> {
        self.request(&ClusterState).await
    }
}

/// [`Factory`] that dials real TCP connections.
pub struct CacheClientFactory;

#[async_trait]
impl Factory for CacheClientFactory {
    async fn get(&self, address: String) -> Result<Box<dyn Client + Send>> {
        let mut client = CacheClient::new(address);
        client.connect().await?;
        Ok(Box::new(client))
    }
}
