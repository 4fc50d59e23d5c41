//! Wire types shared between commands.
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::utils::serde_hex_bytes;

/// One artifact file inside a store/replicate batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Artifact {
    /// Package the artifact was built from (a relative path).
    pub package: String,
    /// Build target within the package.
    pub target: String,
    /// Output file name.
    pub file: String,
    /// File contents.
    #[serde(with = "serde_hex_bytes")]
    pub body: Bytes,
}

/// Identifies the artifacts of one build target without carrying bodies.
/// Deletion works at target granularity: all hashes and files stored for the
/// target are removed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactTarget {
    pub package: String,
    pub target: String,
}

/// Names a single artifact file to fetch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub package: String,
    pub target: String,
    pub file: String,
}
