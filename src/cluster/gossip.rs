//! The gossip layer that keeps every node's view of its peers alive.
//!
//! This is a TCP based protocol used for:
//!   1. Node discovery
//!     A node joining the cluster heartbeats a seed first; the peer lists the
//!     two sides exchange teach the newcomer everyone's name, gossip address
//!     and RPC address, after which it can pick any member to request a ring
//!     slot from.
//!   2. Liveness
//!     Every node picks one random peer per cycle and sends it its current
//!     peer view. Peers that cannot be reached are marked
//!     [`PeerStatus::PossiblyOffline`]. Peers are never removed
//!     automatically: slot assignment is tied to node names and re-slicing
//!     the ring is an operator decision, not something gossip should trigger.
//!
//! Staleness between views is resolved with a per-peer tick counter: a node
//! increments its own tick every cycle, and a received entry only overwrites
//! the local one if its tick is higher.
use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

use crate::client::{cache_client::CacheClientFactory, Client, Factory as ClientFactory};

use super::{
    error::{Error, Result},
    Cluster,
};

/// How often each node heartbeats one random peer.
pub const HEARTBEAT_INTERVAL: tokio::time::Duration = tokio::time::Duration::from_secs(1);

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum PeerStatus {
    /// Peer answered its last contact.
    Ok,
    /// Peer could not be reached - possibly transient.
    PossiblyOffline,
}

/// A peer as tracked by gossip. This is identity and liveness only; ring
/// slice ownership lives in [`super::membership::Membership`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    /// Stable node name - the same key the membership list uses.
    pub name: String,
    /// host:port of the peer's gossip listener.
    pub gossip_address: String,
    /// host:port of the peer's RPC listener.
    pub rpc_address: String,
    pub status: PeerStatus,
    /// Incremented by the peer itself on every cycle; arbitrates staleness.
    pub tick: u64,
}

impl Peer {
    pub fn new(name: String, gossip_address: String, rpc_address: String) -> Self {
        Self {
            name,
            gossip_address,
            rpc_address,
            status: PeerStatus::Ok,
            tick: 0,
        }
    }
}

/// The live peer view of one node.
#[derive(Debug)]
pub struct Gossip {
    own_name: String,
    inner: RwLock<HashMap<String, Peer>>,
}

impl Gossip {
    pub fn new(own: Peer) -> Self {
        let own_name = own.name.clone();
        let mut peers = HashMap::new();
        peers.insert(own_name.clone(), own);
        Self {
            own_name,
            inner: RwLock::new(peers),
        }
    }

    fn acquire_read(&self) -> Result<RwLockReadGuard<HashMap<String, Peer>>> {
        self.inner.read().map_err(|_| Error::Logic {
            reason: "gossip lock poisoned".to_string(),
        })
    }

    fn acquire_write(&self) -> Result<RwLockWriteGuard<HashMap<String, Peer>>> {
        self.inner.write().map_err(|_| Error::Logic {
            reason: "gossip lock poisoned".to_string(),
        })
    }

    pub fn own_name(&self) -> &str {
        &self.own_name
    }

    /// Bumps our own tick so peers know this view is current.
    pub fn tick(&self) -> Result<()> {
        let mut peers = self.acquire_write()?;
        if let Some(own) = peers.get_mut(&self.own_name) {
            own.tick += 1;
            own.status = PeerStatus::Ok;
        }
        Ok(())
    }

    /// Merges a peer view received from another node into ours.
    pub fn merge_peers(&self, peers: Vec<Peer>) -> Result<()> {
        let mut current = self.acquire_write()?;
        for peer in peers {
            match current.get_mut(&peer.name) {
                Some(known) => {
                    if peer.name == self.own_name {
                        // Edge case: we restarted and our tick went back to
                        // zero while the cluster still remembers a much
                        // higher one. Jump past the echo so our own entries
                        // win again.
                        if peer.tick > known.tick {
                            known.tick = peer.tick + 1000;
                        }
                        continue;
                    }
                    if known.tick < peer.tick {
                        *known = peer;
                    }
                }
                None => {
                    event!(Level::INFO, "Discovered peer {} via gossip", peer.name);
                    current.insert(peer.name.clone(), peer);
                }
            }
        }
        Ok(())
    }

    pub fn mark_possibly_offline(&self, name: &str) -> Result<()> {
        let mut peers = self.acquire_write()?;
        if let Some(peer) = peers.get_mut(name) {
            peer.status = PeerStatus::PossiblyOffline;
            peer.tick += 1;
        }
        Ok(())
    }

    pub fn peers(&self) -> Result<Vec<Peer>> {
        let peers = self.acquire_read()?;
        Ok(peers.values().cloned().collect())
    }

    /// Returns a random peer that is not ourselves.
    pub fn random_peer(&self) -> Result<Peer> {
        let peers = self.acquire_read()?;
        let others: Vec<&Peer> = peers.values().filter(|p| p.name != self.own_name).collect();
        if others.is_empty() {
            return Err(Error::ClusterHasOnlySelf);
        }
        let idx = rand::thread_rng().gen_range(0..others.len());
        Ok(others[idx].clone())
    }
}

/// Runs the heartbeat cycle forever. Spawned by the server once the node is
/// part of a cluster.
pub async fn start_heartbeat(cluster: Arc<Cluster>) {
    let mut connections = HashMap::new();
    loop {
        tokio::time::sleep(HEARTBEAT_INTERVAL).await;
        if let Err(err) = do_heartbeat(
            cluster.gossip(),
            Box::new(CacheClientFactory),
            &mut connections,
        )
        .await
        {
            match err {
                Error::ClusterHasOnlySelf => {
                    event!(Level::DEBUG, "Skipping heartbeat to self");
                }
                _ => {
                    event!(Level::WARN, "Heartbeat cycle failed: {}", err);
                }
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum HeartbeatOutcome {
    Skipped,
    Success,
}

async fn do_heartbeat(
    gossip: Arc<Gossip>,
    client_factory: Box<dyn ClientFactory + Send>,
    connections: &mut HashMap<String, Box<dyn Client + Send>>,
) -> Result<HeartbeatOutcome> {
    gossip.tick()?;

    let target = match gossip.random_peer() {
        Ok(target) => target,
        Err(Error::ClusterHasOnlySelf) => return Ok(HeartbeatOutcome::Skipped),
        Err(err) => return Err(err),
    };

    // Re-use a cached connection when one exists, otherwise dial and cache.
    if !connections.contains_key(&target.name) {
        match client_factory.get(target.gossip_address.clone()).await {
            Ok(client) => {
                connections.insert(target.name.clone(), client);
            }
            Err(err) => {
                gossip.mark_possibly_offline(&target.name)?;
                return Err(err.into());
            }
        }
    }
    // unwrap is safe - the entry was inserted just above if it was missing
    let client = connections.get_mut(&target.name).unwrap();

    match client.heartbeat(gossip.peers()?).await {
        Ok(response) => {
            gossip.merge_peers(response.peers)?;
            Ok(HeartbeatOutcome::Success)
        }
        Err(err) => {
            event!(
                Level::WARN,
                "Unable to heartbeat peer {:?} - err {:?}",
                target,
                err
            );
            connections.remove(&target.name);
            gossip.mark_possibly_offline(&target.name)?;
            Err(err.into())
        }
    }
}
