//! Local artifact storage.
//!
//! Stores are keyed by a relative artifact path following the convention
//! `{os}_{arch}/{package}/{target}/{base64url(hash)}/{file}` built by
//! [`artifact_path`]. The store only ever sees opaque paths and bodies; all
//! cluster routing decisions happen before a store call is made.
use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use serde::Serialize;
use std::fmt::Debug;

pub mod dir;
pub mod in_memory;

#[async_trait]
pub trait ArtifactStore: Debug {
    /// Writes an artifact body at the given relative path, overwriting any
    /// previous content.
    async fn store(&self, path: &str, body: Bytes) -> Result<()>;
    /// Reads an artifact body back; `None` for a cache miss.
    async fn retrieve(&self, path: &str) -> Result<Option<Bytes>>;
    /// Removes the artifact file at `path`, or everything stored beneath it
    /// when it names a directory level (deletes are issued per target, which
    /// removes all hashes and files kept for it). Removing something missing
    /// is not an error.
    async fn delete(&self, path: &str) -> Result<()>;
    /// Clears the entire store.
    async fn delete_all(&self) -> Result<()>;
}

/// Directory holding everything stored for one build target, across all
/// hashes. Deletes happen at this granularity.
pub fn target_dir(os: &str, arch: &str, package: &str, target: &str) -> String {
    format!("{}_{}/{}/{}", os, arch, package, target)
}

/// Directory part of the storage path for one (artifact hash, target) pair.
pub fn artifact_dir(os: &str, arch: &str, package: &str, target: &str, hash: &[u8]) -> String {
    format!(
        "{}/{}",
        target_dir(os, arch, package, target),
        BASE64_URL_SAFE_NO_PAD.encode(hash)
    )
}

/// Full storage path for a single artifact file.
pub fn artifact_path(
    os: &str,
    arch: &str,
    package: &str,
    target: &str,
    hash: &[u8],
    file: &str,
) -> String {
    format!("{}/{}", artifact_dir(os, arch, package, target, hash), file)
}

#[derive(Debug, Serialize)]
pub enum Error {
    Io { reason: String },
    Logic { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::artifact_path;

    #[test]
    fn path_convention() {
        let path = artifact_path(
            "linux",
            "amd64",
            "src/core",
            "core",
            &[0xde, 0xad, 0xbe, 0xef],
            "core.a",
        );
        assert_eq!(path, "linux_amd64/src/core/core/3q2-7w/core.a");
    }
}
