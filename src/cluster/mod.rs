//! Cluster coordination for rcache.
//!
//! A cluster is a fixed number of nodes splitting a consistent-hash ring
//! between them. Each artifact hashes to a primary point and an alternate
//! point on the ring; the node that stores an artifact forwards a copy to
//! whoever owns the other point, so every artifact ends up on (at most) two
//! nodes. Replication is advisory: a replica that can't be reached costs a
//! future cache miss, not an error on the store path.
//!
//! The moving parts:
//!   - [`hash_space`]: pure ring math shared by everyone
//!   - [`membership`]: the slot list tying node names to ring slices
//!   - [`gossip`]: peer discovery and liveness
//!   - [`Cluster`]: ties the three together and owns the connection pool
//!     used to talk to other members
pub mod error;
pub mod gossip;
pub mod hash_space;
pub mod membership;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Mutex;
use tracing::{event, Level};

use crate::client::{Client, Factory as ClientFactory};
use crate::cmd::cluster::join::JoinResponse;
use crate::cmd::delete::Delete;
use crate::cmd::replicate::Replicate;
use crate::cmd::store::Store;

use error::{Error, Result};
use gossip::{Gossip, Peer};
use membership::{Membership, Node};

type ClientPool = HashMap<String, Box<dyn Client + Send>>;

/// One node's handle on the cluster it is part of.
pub struct Cluster {
    own: Peer,
    gossip: Arc<Gossip>,
    membership: Membership,
    /// The ring slot this node occupies, set on init or after a successful
    /// join.
    local: RwLock<Option<Node>>,
    /// Cached connections to other members, keyed by node name. A connection
    /// is taken out of the pool for the duration of an RPC and put back
    /// afterwards, so the lock is never held across an await and a slow peer
    /// never stalls calls to the others.
    clients: Mutex<ClientPool>,
    client_factory: Box<dyn ClientFactory + Send + Sync>,
}

impl Cluster {
    pub fn new(own: Peer, client_factory: Box<dyn ClientFactory + Send + Sync>) -> Self {
        Self {
            gossip: Arc::new(Gossip::new(own.clone())),
            own,
            membership: Membership::new(),
            local: RwLock::new(None),
            clients: Mutex::new(HashMap::new()),
            client_factory,
        }
    }

    pub fn gossip(&self) -> Arc<Gossip> {
        self.gossip.clone()
    }

    pub fn own_name(&self) -> &str {
        &self.own.name
    }

    fn read_local(&self) -> Result<RwLockReadGuard<Option<Node>>> {
        self.local.read().map_err(|_| Error::Logic {
            reason: "local node lock poisoned".to_string(),
        })
    }

    fn write_local(&self) -> Result<RwLockWriteGuard<Option<Node>>> {
        self.local.write().map_err(|_| Error::Logic {
            reason: "local node lock poisoned".to_string(),
        })
    }

    /// Seeds a brand-new cluster of the given size with this node in the
    /// first slot.
    pub fn init(&self, size: usize) -> Result<()> {
        self.membership.init(size)?;
        match self
            .membership
            .add_node(&self.own.name, &self.own.rpc_address)?
        {
            Some(node) => {
                *self.write_local()? = Some(node);
                Ok(())
            }
            None => Err(Error::Internal {
                reason: "freshly initialized membership rejected the seed node".to_string(),
            }),
        }
    }

    /// Joins an existing cluster through the given seed gossip addresses.
    ///
    /// Runs in two phases: first heartbeat the seeds to learn who is in the
    /// cluster, then ask the discovered peers for a ring slot until one
    /// admits us. Exhausting every peer is fatal; the caller should not come
    /// up as a member it never became.
    pub async fn join(&self, seeds: &[String]) -> Result<()> {
        for seed in seeds {
            match self.client_factory.get(seed.clone()).await {
                Ok(mut client) => match client.heartbeat(self.gossip.peers()?).await {
                    Ok(response) => self.gossip.merge_peers(response.peers)?,
                    Err(err) => {
                        event!(Level::WARN, "Seed {} didn't answer heartbeat: {}", seed, err);
                    }
                },
                Err(err) => {
                    event!(Level::WARN, "Unable to reach seed {}: {}", seed, err);
                }
            }
        }

        let mut attempted = 0;
        let candidates: Vec<Peer> = self
            .gossip
            .peers()?
            .into_iter()
            .filter(|p| p.name != self.own.name)
            .collect();
        for peer in candidates {
            attempted += 1;
            let response = match self.join_via(&peer).await {
                Ok(response) => response,
                Err(err) => {
                    event!(
                        Level::WARN,
                        "Join request to peer {} failed: {}",
                        peer.name,
                        err
                    );
                    continue;
                }
            };
            if !response.success {
                event!(
                    Level::WARN,
                    "Peer {} refused our join request (cluster is full)",
                    peer.name
                );
                continue;
            }
            let node = match response.node {
                Some(node) => node,
                None => {
                    event!(
                        Level::WARN,
                        "Peer {} admitted us but returned no slot",
                        peer.name
                    );
                    continue;
                }
            };
            self.membership.adopt(response.size, response.nodes)?;
            *self.write_local()? = Some(node);
            event!(
                Level::INFO,
                "Joined cluster of size {} via peer {}",
                response.size,
                peer.name
            );
            return Ok(());
        }
        Err(Error::JoinExhausted { attempted })
    }

    async fn join_via(&self, peer: &Peer) -> Result<JoinResponse> {
        let mut client = self.take_client(&peer.name, &peer.rpc_address).await?;
        match client
            .join_cluster(self.own.name.clone(), self.own.rpc_address.clone())
            .await
        {
            Ok(response) => {
                self.return_client(&peer.name, client).await;
                Ok(response)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Handles a join request from another node: assign (or give back) a
    /// slot and return the full membership view for the joiner to adopt.
    pub async fn add_node(&self, name: String, address: String) -> Result<JoinResponse> {
        match self.membership.add_node(&name, &address)? {
            Some(node) => {
                // The node may have come back under a new address; drop any
                // cached connection to the old one.
                self.clients.lock().await.remove(&name);
                Ok(JoinResponse {
                    success: true,
                    node: Some(node),
                    nodes: self.membership.nodes()?,
                    size: self.membership.size()?,
                })
            }
            None => Ok(JoinResponse {
                success: false,
                node: None,
                nodes: Vec::new(),
                size: 0,
            }),
        }
    }

    /// The ring slot this node occupies, if it has one yet.
    pub fn self_node(&self) -> Result<Option<Node>> {
        Ok(self.read_local()?.clone())
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.membership.size()?)
    }

    /// Returns the current slot list, first refreshing addresses from the
    /// gossip view so nodes that restarted elsewhere are reachable again.
    pub fn get_members(&self) -> Result<Vec<Node>> {
        if self.membership.size()? > 0 {
            for peer in self.gossip.peers()? {
                let _ = self.membership.add_node(&peer.name, &peer.rpc_address)?;
            }
        }
        Ok(self.membership.nodes()?)
    }

    /// Resolves the member that should hold the replica of the artifact with
    /// the given content hash.
    ///
    /// The primary ring point decides unless it falls in our own slice, in
    /// which case the alternate point is used. If the resolved owner is still
    /// ourselves (a single-node cluster), there is nowhere to replicate to.
    pub fn get_alternate_node(&self, artifact_hash: &[u8]) -> Result<Option<Node>> {
        let local = self.self_node()?.ok_or(Error::Uninitialized)?;
        let mut point = hash_space::hash(artifact_hash);
        if local.contains(point) {
            point = hash_space::alternate_hash(artifact_hash);
        }
        match self.membership.owner_of(point)? {
            Some(node) if node.name == local.name => Ok(None),
            Some(node) => Ok(Some(node)),
            None => {
                event!(Level::WARN, "No cluster node owns ring point {}", point);
                Ok(None)
            }
        }
    }

    /// Forwards a stored batch to this node's replica. Advisory: every
    /// failure mode is logged and swallowed, a missing replica is just a
    /// future cache miss.
    pub async fn replicate_artifacts(&self, batch: Store) {
        let target = match self.get_alternate_node(&batch.hash) {
            Ok(Some(node)) => node,
            Ok(None) => {
                event!(
                    Level::WARN,
                    "No replica node available, artifacts will not be replicated"
                );
                return;
            }
            Err(err) => {
                event!(Level::ERROR, "Unable to resolve replica node: {}", err);
                return;
            }
        };
        event!(Level::INFO, "Replicating artifacts to node {}", target.address);
        let cmd = Replicate {
            os: batch.os,
            arch: batch.arch,
            hash: batch.hash,
            artifacts: batch.artifacts,
            peer: self.own.name.clone(),
        };
        match self.replicate_on(&target, cmd).await {
            Ok(success) if !success => {
                event!(
                    Level::ERROR,
                    "Node {} failed to store replicated artifacts",
                    target.address
                );
            }
            Ok(_) => {}
            Err(err) => {
                event!(
                    Level::ERROR,
                    "Error replicating artifacts to {}: {}",
                    target.address,
                    err
                );
            }
        }
    }

    async fn replicate_on(&self, node: &Node, cmd: Replicate) -> Result<bool> {
        let mut client = self.take_client(&node.name, &node.address).await?;
        match client.replicate(cmd).await {
            Ok(response) => {
                self.return_client(&node.name, client).await;
                Ok(response.success)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Forwards a delete to every other member so no stale copy survives
    /// anywhere. Per-member failures are logged and do not stop the fan-out.
    pub async fn delete_artifacts(&self, cmd: Delete) {
        let members = match self.get_members() {
            Ok(members) => members,
            Err(err) => {
                event!(
                    Level::ERROR,
                    "Unable to list members for delete fan-out: {}",
                    err
                );
                return;
            }
        };
        let mut forwarded = cmd;
        forwarded.replication = true;
        for node in members
            .iter()
            .filter(|n| !n.is_vacant() && n.name != self.own.name)
        {
            event!(Level::INFO, "Forwarding delete to node {}", node.address);
            match self.delete_on(node, forwarded.clone()).await {
                Ok(success) if !success => {
                    event!(Level::ERROR, "Node {} failed to delete artifacts", node.address);
                }
                Ok(_) => {}
                Err(err) => {
                    event!(
                        Level::ERROR,
                        "Error forwarding delete to {}: {}",
                        node.address,
                        err
                    );
                }
            }
        }
    }

    async fn delete_on(&self, node: &Node, cmd: Delete) -> Result<bool> {
        let mut client = self.take_client(&node.name, &node.address).await?;
        match client.delete(cmd).await {
            Ok(response) => {
                self.return_client(&node.name, client).await;
                Ok(response.success)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Takes the pooled connection to the named member, dialing a fresh one
    /// if none is cached.
    async fn take_client(&self, name: &str, address: &str) -> Result<Box<dyn Client + Send>> {
        if let Some(client) = self.clients.lock().await.remove(name) {
            return Ok(client);
        }
        Ok(self.client_factory.get(address.to_string()).await?)
    }

    /// Puts a connection back after a successful RPC. Connections that
    /// failed are dropped instead, forcing a redial on the next call.
    async fn return_client(&self, name: &str, client: Box<dyn Client + Send>) {
        self.clients.lock().await.insert(name.to_string(), client);
    }
}
