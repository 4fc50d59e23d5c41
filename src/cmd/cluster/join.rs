use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cache::CacheNode;
use crate::cluster::membership::Node;
use crate::error::Result;
use crate::server::message::{IntoMessage, Message};

/// Asks an existing cluster member to admit the sender.
///
/// A refusal because the cluster is full is a normal response with
/// `success: false`, not an error; the joiner simply asks someone else.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinCluster {
    /// Stable name of the joining node.
    pub name: String,
    /// Address the joining node serves cache rpc on.
    pub address: String,
}

impl JoinCluster {
    pub fn new(name: String, address: String) -> Self {
        Self { name, address }
    }

    #[instrument(name = "cmd::cluster::join", skip(self, node), fields(name = %self.name, address = %self.address))]
    pub async fn execute(self, node: Arc<CacheNode>) -> Result<JoinResponse> {
        node.join(self.name, self.address).await
    }

    pub fn try_from_message(message: Message) -> Result<Self> {
        super::super::try_from_message_with_payload!(message, super::super::CLUSTER_JOIN_CMD, Self)
    }
}

impl IntoMessage for JoinCluster {
    fn id(&self) -> u32 {
        super::super::CLUSTER_JOIN_CMD
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    pub success: bool,
    /// The hash slot assigned to the joiner when successful.
    pub node: Option<Node>,
    /// Full slot list of the cluster, vacant slots included.
    pub nodes: Vec<Node>,
    /// Fixed cluster size.
    pub size: usize,
}
