use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cache::CacheNode;
use crate::cluster::gossip::Peer;
use crate::error::Result;
use crate::server::message::{IntoMessage, Message};

/// Gossip exchange. The sender ships its current peer view and receives the
/// receiver's view back; both sides merge what they learn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Heartbeat {
    pub peers: Vec<Peer>,
}

impl Heartbeat {
    pub fn new(peers: Vec<Peer>) -> Self {
        Self { peers }
    }

    #[instrument(name = "cmd::cluster::heartbeat", level = "debug", skip(self, node), fields(n_peers = self.peers.len()))]
    pub async fn execute(self, node: Arc<CacheNode>) -> Result<HeartbeatResponse> {
        node.heartbeat(self.peers).await
    }

    pub fn try_from_message(message: Message) -> Result<Self> {
        super::super::try_from_message_with_payload!(
            message,
            super::super::CLUSTER_HEARTBEAT_CMD,
            Self
        )
    }
}

impl IntoMessage for Heartbeat {
    fn id(&self) -> u32 {
        super::super::CLUSTER_HEARTBEAT_CMD
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub peers: Vec<Peer>,
}
