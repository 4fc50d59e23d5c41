use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cache::CacheNode;
use crate::cluster::gossip::Peer;
use crate::cluster::membership::Node;
use crate::error::Result;
use crate::server::message::IntoMessage;

/// Dumps the node's view of the cluster. Used by operators and tests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterState;

impl ClusterState {
    #[instrument(name = "cmd::cluster::cluster_state", level = "debug", skip(self, node))]
    pub async fn execute(self, node: Arc<CacheNode>) -> Result<ClusterStateResponse> {
        node.cluster_state().await
    }
}

impl IntoMessage for ClusterState {
    fn id(&self) -> u32 {
        super::super::CLUSTER_STATE_CMD
    }

    fn payload(&self) -> Option<Bytes> {
        None
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterStateResponse {
    /// Name of the answering node.
    pub name: String,
    /// Gossip view, including the answering node itself.
    pub peers: Vec<Peer>,
    /// Hash slot assignments.
    pub nodes: Vec<Node>,
    pub size: usize,
}
