use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::types::Artifact;
use crate::cache::CacheNode;
use crate::error::Result;
use crate::server::message::{IntoMessage, Message};
use crate::utils::serde_hex_bytes;

/// Stores a batch of artifacts produced by a single build action.
///
/// In cluster mode, a successful local store also kicks off advisory
/// replication to this node's replica.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Store {
    pub os: String,
    pub arch: String,
    /// Content hash of the build action. Routes the batch on the hash ring
    /// and names a directory level of the storage path.
    #[serde(with = "serde_hex_bytes")]
    pub hash: Bytes,
    pub artifacts: Vec<Artifact>,
}

impl Store {
    pub fn new(os: String, arch: String, hash: Bytes, artifacts: Vec<Artifact>) -> Self {
        Self {
            os,
            arch,
            hash,
            artifacts,
        }
    }

    #[instrument(name = "cmd::store", skip(self, node), fields(os = %self.os, arch = %self.arch, n_artifacts = self.artifacts.len()))]
    pub async fn execute(self, node: Arc<CacheNode>) -> Result<StoreResponse> {
        let success = node.store_artifacts(self).await?;
        Ok(StoreResponse { success })
    }

    pub fn try_from_message(message: Message) -> Result<Self> {
        super::try_from_message_with_payload!(message, super::STORE_CMD, Self)
    }
}

impl IntoMessage for Store {
    fn id(&self) -> u32 {
        super::STORE_CMD
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreResponse {
    pub success: bool,
}
