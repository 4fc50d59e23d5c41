use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::types::Artifact;
use crate::cache::CacheNode;
use crate::error::Result;
use crate::server::message::{IntoMessage, Message};
use crate::utils::serde_hex_bytes;

/// A store batch forwarded by a peer for replication.
///
/// Executed exactly like [`super::store::Store`] except it never triggers
/// further replication, otherwise two replicas would bounce the same batch
/// back and forth forever.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Replicate {
    pub os: String,
    pub arch: String,
    #[serde(with = "serde_hex_bytes")]
    pub hash: Bytes,
    pub artifacts: Vec<Artifact>,
    /// Name of the peer that forwarded the batch, for observability.
    pub peer: String,
}

impl Replicate {
    #[instrument(name = "cmd::replicate", skip(self, node), fields(os = %self.os, arch = %self.arch, peer = %self.peer, n_artifacts = self.artifacts.len()))]
    pub async fn execute(self, node: Arc<CacheNode>) -> Result<ReplicateResponse> {
        let success = node.replicate_artifacts(self).await?;
        Ok(ReplicateResponse { success })
    }

    pub fn try_from_message(message: Message) -> Result<Self> {
        super::try_from_message_with_payload!(message, super::REPLICATE_CMD, Self)
    }
}

impl IntoMessage for Replicate {
    fn id(&self) -> u32 {
        super::REPLICATE_CMD
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicateResponse {
    pub success: bool,
}
