use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::types::{Artifact, ArtifactKey};
use crate::cache::CacheNode;
use crate::error::Result;
use crate::server::message::{IntoMessage, Message};
use crate::utils::serde_hex_bytes;

/// Fetches a batch of previously stored artifacts.
///
/// The response only claims success if every requested file is present; a
/// partial cache hit is useless to a build client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Retrieve {
    pub os: String,
    pub arch: String,
    #[serde(with = "serde_hex_bytes")]
    pub hash: Bytes,
    pub artifacts: Vec<ArtifactKey>,
}

impl Retrieve {
    pub fn new(os: String, arch: String, hash: Bytes, artifacts: Vec<ArtifactKey>) -> Self {
        Self {
            os,
            arch,
            hash,
            artifacts,
        }
    }

    #[instrument(name = "cmd::retrieve", skip(self, node), fields(os = %self.os, arch = %self.arch, n_artifacts = self.artifacts.len()))]
    pub async fn execute(self, node: Arc<CacheNode>) -> Result<RetrieveResponse> {
        match node.retrieve_artifacts(self).await? {
            Some(artifacts) => Ok(RetrieveResponse {
                success: true,
                artifacts,
            }),
            None => Ok(RetrieveResponse {
                success: false,
                artifacts: Vec::new(),
            }),
        }
    }

    pub fn try_from_message(message: Message) -> Result<Self> {
        super::try_from_message_with_payload!(message, super::RETRIEVE_CMD, Self)
    }
}

impl IntoMessage for Retrieve {
    fn id(&self) -> u32 {
        super::RETRIEVE_CMD
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub success: bool,
    pub artifacts: Vec<Artifact>,
}
