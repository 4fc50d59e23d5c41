//! Client abstractions for talking to rcache nodes.
//!
//! [`Client`] is a trait so that the cluster layer can be unit tested with a
//! [`mock::MockClient`] instead of real TCP connections. Production code uses
//! [`cache_client::CacheClient`] through [`cache_client::CacheClientFactory`].
pub mod cache_client;
pub mod error;
pub mod mock;

use async_trait::async_trait;

use crate::cluster::gossip::Peer;
use crate::cmd::cluster::cluster_state::ClusterStateResponse;
use crate::cmd::cluster::heartbeat::HeartbeatResponse;
use crate::cmd::cluster::join::JoinResponse;
use crate::cmd::delete::{Delete, DeleteResponse};
use crate::cmd::ping::PingResponse;
use crate::cmd::replicate::{Replicate, ReplicateResponse};
use crate::cmd::retrieve::{Retrieve, RetrieveResponse};
use crate::cmd::store::{Store, StoreResponse};

use error::Result;

/// Trait that defines which functions a client to an rcache node has to
/// implement.
#[async_trait]
pub trait Client {
    /// Establishes the underlying connection. Must be called before any
    /// other method.
    async fn connect(&mut self) -> Result<()>;
    /// Liveness probe.
    async fn ping(&mut self) -> Result<PingResponse>;
    /// Stores a batch of artifacts on the remote node.
    async fn store(&mut self, cmd: Store) -> Result<StoreResponse>;
    /// Fetches a batch of artifacts from the remote node.
    async fn retrieve(&mut self, cmd: Retrieve) -> Result<RetrieveResponse>;
    /// Deletes artifacts on the remote node.
    async fn delete(&mut self, cmd: Delete) -> Result<DeleteResponse>;
    /// Forwards a store batch to the remote node for replication.
    async fn replicate(&mut self, cmd: Replicate) -> Result<ReplicateResponse>;
    /// Asks the remote node to admit us into its cluster.
    async fn join_cluster(&mut self, name: String, address: String) -> Result<JoinResponse>;
    /// Exchanges gossip peer views with the remote node.
    async fn heartbeat(&mut self, peers: Vec<Peer>) -> Result<HeartbeatResponse>;
    /// Dumps the remote node's view of the cluster.
    async fn cluster_state(&mut self) -> Result<ClusterStateResponse>;
}

/// A [`Client`] factory. The cluster layer dials peers through this seam so
/// tests can swap in mocks.
#[async_trait]
pub trait Factory {
    /// Returns a connected [`Client`] for the given `host:port` address.
    async fn get(&self, address: String) -> Result<Box<dyn Client + Send>>;
}
