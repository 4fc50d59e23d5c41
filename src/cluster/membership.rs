//! The canonical membership list: a fixed-capacity, ordered sequence of
//! slots, each owning one contiguous slice of the hash ring.
//!
//! Capacity is set once when the cluster is seeded and never changes (there
//! is no online rehashing - see the crate docs). Slots are filled in order as
//! nodes join; a node that restarts under the same name takes its old slot
//! back, which keeps its ring slice stable. Slices are always recomputed from
//! `(slot index, cluster size)` on assignment, never copied from a previous
//! value.
//!
//! This list is the only membership state shared between the request path and
//! the join/gossip path, so all access goes through a single read-write lock.
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{event, Level};

use super::error::{Error, Result};
use super::hash_space;

/// One cache server in the cluster, as seen by the membership list.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Cluster-assigned identifier, stable across restarts.
    pub name: String,
    /// host:port of the node's RPC listener.
    pub address: String,
    /// Inclusive lower bound of the ring slice owned by this node.
    pub hash_begin: u32,
    /// Exclusive upper bound of the ring slice owned by this node.
    pub hash_end: u32,
}

impl Node {
    /// Whether the given ring point falls inside this node's slice.
    pub fn contains(&self, point: u32) -> bool {
        point >= self.hash_begin && point < self.hash_end
    }

    /// A vacant slot is one whose previous occupant never existed or is being
    /// held for a node of that name to rejoin.
    pub fn is_vacant(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Expected number of nodes, fixed at seed time. Zero means the list has
    /// not been initialized yet (the node is still unjoined or standalone).
    size: usize,
    /// The slot list. Grows up to `size`, never shrinks.
    nodes: Vec<Node>,
}

/// The membership list itself. Cheap to share behind an `Arc`; interior
/// mutability with reader/writer locking since request routing reads it
/// concurrently with join handling writing it.
#[derive(Debug, Default)]
pub struct Membership {
    inner: RwLock<Inner>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire_read(&self) -> Result<RwLockReadGuard<Inner>> {
        self.inner.read().map_err(|_| Error::Logic {
            reason: "membership lock poisoned".to_string(),
        })
    }

    fn acquire_write(&self) -> Result<RwLockWriteGuard<Inner>> {
        self.inner.write().map_err(|_| Error::Logic {
            reason: "membership lock poisoned".to_string(),
        })
    }

    /// Fixes the cluster capacity. Only the node seeding a brand-new cluster
    /// calls this; everyone else learns the size from a join response.
    pub fn init(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(Error::Logic {
                reason: "cluster size must be at least 1".to_string(),
            });
        }
        let mut inner = self.acquire_write()?;
        if inner.size != 0 {
            return Err(Error::Logic {
                reason: format!("membership already initialized with size {}", inner.size),
            });
        }
        inner.size = size;
        inner.nodes = Vec::with_capacity(size);
        Ok(())
    }

    /// Installs a node list received from an existing member as ground truth.
    /// Used by a joining node to adopt the cluster's view in one step.
    pub fn adopt(&self, size: usize, nodes: Vec<Node>) -> Result<()> {
        if size == 0 || nodes.len() > size {
            return Err(Error::Internal {
                reason: format!(
                    "refusing to adopt {} nodes into a cluster of size {}",
                    nodes.len(),
                    size
                ),
            });
        }
        let mut inner = self.acquire_write()?;
        inner.size = size;
        inner.nodes = nodes;
        Ok(())
    }

    /// Assigns (or re-assigns) a slot to the named node.
    ///
    /// Scans slots in order: a slot whose name matches is taken over (a
    /// rejoin - the node gets its old ring slice back), otherwise the first
    /// vacant slot is used, otherwise a new slot is appended while capacity
    /// remains. Returns `None` when the cluster is full.
    ///
    /// The slot's ring slice is always recomputed from its index and the
    /// cluster size, so repeated joins under the same name are idempotent.
    pub fn add_node(&self, name: &str, address: &str) -> Result<Option<Node>> {
        let mut inner = self.acquire_write()?;
        if inner.size == 0 {
            return Err(Error::Uninitialized);
        }
        let size = inner.size;
        for i in 0..inner.nodes.len() {
            let slot = &inner.nodes[i];
            if slot.is_vacant() || slot.name == name {
                if slot.name == name {
                    event!(
                        Level::INFO,
                        "Node {} / {} matched to slot {}",
                        name,
                        address,
                        i
                    );
                } else {
                    event!(Level::INFO, "Populating slot {}: {} / {}", i, name, address);
                }
                let node = assign(i, size, name, address);
                inner.nodes[i] = node.clone();
                return Ok(Some(node));
            }
        }
        if inner.nodes.len() < size {
            let node = assign(inner.nodes.len(), size, name, address);
            inner.nodes.push(node.clone());
            return Ok(Some(node));
        }
        event!(
            Level::WARN,
            "Node {} / {} attempted to join, but there is no space available [{} / {}]",
            name,
            address,
            inner.nodes.len(),
            size
        );
        Ok(None)
    }

    /// Returns the node whose ring slice contains the given point, if any.
    /// Vacant slots still own their slice but cannot receive traffic, so they
    /// resolve to `None`.
    pub fn owner_of(&self, point: u32) -> Result<Option<Node>> {
        let inner = self.acquire_read()?;
        Ok(inner
            .nodes
            .iter()
            .find(|n| !n.is_vacant() && n.contains(point))
            .cloned())
    }

    pub fn nodes(&self) -> Result<Vec<Node>> {
        let inner = self.acquire_read()?;
        Ok(inner.nodes.clone())
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.acquire_read()?.size)
    }
}

fn assign(index: usize, size: usize, name: &str, address: &str) -> Node {
    Node {
        name: name.to_string(),
        address: address.to_string(),
        hash_begin: hash_space::hash_point(index, size),
        hash_end: hash_space::hash_point(index + 1, size),
    }
}
