use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::types::ArtifactTarget;
use crate::cache::CacheNode;
use crate::error::Result;
use crate::server::message::{IntoMessage, Message};

/// Deletes all stored artifacts for a set of build targets, or the entire
/// local store when `everything` is set.
///
/// Deletes must not leave stale copies behind, so in cluster mode the
/// receiving node forwards the request to every other member. Forwarded
/// requests carry `replication: true` and are applied locally only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Delete {
    pub os: String,
    pub arch: String,
    pub targets: Vec<ArtifactTarget>,
    pub everything: bool,
    /// True when this request was forwarded by another cluster member.
    pub replication: bool,
}

impl Delete {
    pub fn new(os: String, arch: String, targets: Vec<ArtifactTarget>, everything: bool) -> Self {
        Self {
            os,
            arch,
            targets,
            everything,
            replication: false,
        }
    }

    #[instrument(name = "cmd::delete", skip(self, node), fields(os = %self.os, arch = %self.arch, everything = self.everything, replication = self.replication))]
    pub async fn execute(self, node: Arc<CacheNode>) -> Result<DeleteResponse> {
        let success = node.delete_artifacts(self).await?;
        Ok(DeleteResponse { success })
    }

    pub fn try_from_message(message: Message) -> Result<Self> {
        super::try_from_message_with_payload!(message, super::DELETE_CMD, Self)
    }
}

impl IntoMessage for Delete {
    fn id(&self) -> u32 {
        super::DELETE_CMD
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}
