//! Mock [`Client`] and [`Factory`] implementations used to unit test the
//! cluster layer without opening sockets.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::error::{Error, Result};
use super::{Client, Factory};
use crate::cluster::gossip::Peer;
use crate::cmd::cluster::cluster_state::ClusterStateResponse;
use crate::cmd::cluster::heartbeat::HeartbeatResponse;
use crate::cmd::cluster::join::JoinResponse;
use crate::cmd::delete::{Delete, DeleteResponse};
use crate::cmd::ping::PingResponse;
use crate::cmd::replicate::{Replicate, ReplicateResponse};
use crate::cmd::retrieve::{Retrieve, RetrieveResponse};
use crate::cmd::store::{Store, StoreResponse};
use crate::test_utils::fault::{Fault, When};

#[derive(Clone, Debug, Default)]
pub struct CallCounts {
    pub connects: usize,
    pub heartbeats: usize,
    pub replicates: usize,
    pub deletes: usize,
    pub joins: usize,
}

/// Per-address call counters, shared between the factory and every client it
/// hands out so tests can assert on what the code under test actually sent.
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<HashMap<String, CallCounts>>,
}

impl Stats {
    pub fn counts(&self, address: &str) -> CallCounts {
        self.inner
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    fn bump(&self, address: &str, f: impl FnOnce(&mut CallCounts)) {
        let mut guard = self.inner.lock().unwrap();
        f(guard.entry(address.to_string()).or_default())
    }
}

pub struct MockClientFactory {
    connection_fault: Fault,
    heartbeat_fault: Fault,
    replicate_fault: Fault,
    heartbeat_peers: Option<Vec<Peer>>,
    join_response: Option<JoinResponse>,
    pub stats: Arc<Stats>,
}

#[async_trait]
impl Factory for MockClientFactory {
    async fn get(&self, address: String) -> Result<Box<dyn Client + Send>> {
        self.stats.bump(&address, |c| c.connects += 1);
        if self.connection_fault.triggers() {
            return Err(Error::UnableToConnect {
                reason: "mock connection fault".to_string(),
            });
        }
        Ok(Box::new(MockClient {
            address,
            heartbeat_fault: self.heartbeat_fault.clone(),
            replicate_fault: self.replicate_fault.clone(),
            heartbeat_peers: self.heartbeat_peers.clone(),
            join_response: self.join_response.clone(),
            stats: self.stats.clone(),
        }))
    }
}

pub struct MockClient {
    address: String,
    heartbeat_fault: Fault,
    replicate_fault: Fault,
    heartbeat_peers: Option<Vec<Peer>>,
    join_response: Option<JoinResponse>,
    stats: Arc<Stats>,
}

#[async_trait]
impl Client for MockClient {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn ping(&mut self) -> Result<PingResponse> {
        Ok(PingResponse {
            message: "PONG".to_string(),
        })
    }

    async fn store(&mut self, _cmd: Store) -> Result<StoreResponse> {
        Ok(StoreResponse { success: true })
    }

    async fn retrieve(&mut self, _cmd: Retrieve) -> Result<RetrieveResponse> {
        Ok(RetrieveResponse {
            success: false,
            artifacts: Vec::new(),
        })
    }

    async fn delete(&mut self, _cmd: Delete) -> Result<DeleteResponse> {
        self.stats.bump(&self.address, |c| c.deletes += 1);
        Ok(DeleteResponse { success: true })
    }

    async fn replicate(&mut self, _cmd: Replicate) -> Result<ReplicateResponse> {
        self.stats.bump(&self.address, |c| c.replicates += 1);
        if self.replicate_fault.triggers() {
            return Err(Error::Io {
                reason: "mock replicate fault".to_string(),
            });
        }
        Ok(ReplicateResponse { success: true })
    }

    async fn join_cluster(&mut self, _name: String, _address: String) -> Result<JoinResponse> {
        self.stats.bump(&self.address, |c| c.joins += 1);
        match &self.join_response {
            Some(response) => Ok(response.clone()),
            // A factory without a canned response plays a full cluster.
            None => Ok(JoinResponse {
                success: false,
                node: None,
                nodes: Vec::new(),
                size: 0,
            }),
        }
    }

    async fn heartbeat(&mut self, peers: Vec<Peer>) -> Result<HeartbeatResponse> {
        self.stats.bump(&self.address, |c| c.heartbeats += 1);
        if self.heartbeat_fault.triggers() {
            return Err(Error::Io {
                reason: "mock heartbeat fault".to_string(),
            });
        }
        // Default behavior is an echo, which is what a peer with the exact
        // same view would answer.
        Ok(HeartbeatResponse {
            peers: self.heartbeat_peers.clone().unwrap_or(peers),
        })
    }

    async fn cluster_state(&mut self) -> Result<ClusterStateResponse> {
        Ok(ClusterStateResponse {
            name: "mock".to_string(),
            peers: Vec::new(),
            nodes: Vec::new(),
            size: 0,
        })
    }
}

#[derive(Default)]
pub struct MockClientFactoryBuilder {
    connection_fault: Fault,
    heartbeat_fault: Fault,
    replicate_fault: Fault,
    heartbeat_peers: Option<Vec<Peer>>,
    join_response: Option<JoinResponse>,
}

impl MockClientFactoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection_fault(mut self, when: When) -> Self {
        self.connection_fault = Fault::new(when);
        self
    }

    pub fn with_heartbeat_fault(mut self, when: When) -> Self {
        self.heartbeat_fault = Fault::new(when);
        self
    }

    pub fn with_replicate_fault(mut self, when: When) -> Self {
        self.replicate_fault = Fault::new(when);
        self
    }

    /// Fixes the peer list every mock client answers heartbeats with,
    /// instead of echoing the request.
    pub fn with_heartbeat_peers(mut self, peers: Vec<Peer>) -> Self {
        self.heartbeat_peers = Some(peers);
        self
    }

    /// Fixes the response every mock client answers join requests with.
    pub fn with_join_response(mut self, response: JoinResponse) -> Self {
        self.join_response = Some(response);
        self
    }

    pub fn without_faults(mut self) -> Self {
        self.connection_fault = Fault::new(When::Never);
        self.heartbeat_fault = Fault::new(When::Never);
        self.replicate_fault = Fault::new(When::Never);
        self
    }

    pub fn build(self) -> MockClientFactory {
        MockClientFactory {
            connection_fault: self.connection_fault,
            heartbeat_fault: self.heartbeat_fault,
            replicate_fault: self.replicate_fault,
            heartbeat_peers: self.heartbeat_peers,
            join_response: self.join_response,
            stats: Arc::new(Stats::default()),
        }
    }
}
