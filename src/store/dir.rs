//! A filesystem backed [`ArtifactStore`] implementation.
//!
//! Artifacts live under a single root directory using their relative storage
//! path verbatim. There is no eviction or age-based cleaning here; operators
//! size the disk for the cache and wipe it out-of-band when needed.
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tracing::instrument;

use super::{ArtifactStore, Error, Result};

#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a relative artifact path under the root. Paths come off the
    /// wire, so anything that would escape the root is rejected.
    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || relative.as_os_str().is_empty() {
            return Err(Error::Logic {
                reason: format!("invalid artifact path: {}", path),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for DirStore {
    #[instrument(name = "store::dir::store", level = "debug", skip(self, body))]
    async fn store(&self, path: &str, body: Bytes) -> Result<()> {
        let full = self.full_path(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(full, &body).await?;
        Ok(())
    }

    #[instrument(name = "store::dir::retrieve", level = "debug", skip(self))]
    async fn retrieve(&self, path: &str) -> Result<Option<Bytes>> {
        let full = self.full_path(path)?;
        match tokio::fs::read(full).await {
            Ok(body) => Ok(Some(body.into())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(name = "store::dir::delete", level = "debug", skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.full_path(path)?;
        let result = match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(full).await,
            Ok(_) => tokio::fs::remove_file(full).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(name = "store::dir::delete_all", level = "debug", skip(self))]
    async fn delete_all(&self) -> Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(path).await?;
            } else {
                tokio::fs::remove_file(path).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DirStore;
    use crate::store::ArtifactStore;
    use bytes::Bytes;

    fn temp_store(test: &str) -> DirStore {
        let mut root = std::env::temp_dir();
        root.push(format!(
            "rcache-dir-store-{}-{}",
            test,
            crate::utils::generate_random_ascii_string(8)
        ));
        DirStore::new(root)
    }

    #[tokio::test]
    async fn store_retrieve_delete_roundtrip() {
        let store = temp_store("roundtrip");
        let path = "linux_amd64/pkg/target/aGFzaA/out.a";
        let body = Bytes::from("artifact body");

        store.store(path, body.clone()).await.unwrap();
        assert_eq!(store.retrieve(path).await.unwrap().unwrap(), body);

        store.delete(path).await.unwrap();
        assert!(store.retrieve(path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retrieve_missing_is_none() {
        let store = temp_store("missing");
        assert!(store.retrieve("a/b/c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_all_clears_the_root() {
        let store = temp_store("delete-all");
        store.store("a/one", Bytes::from("1")).await.unwrap();
        store.store("b/two", Bytes::from("2")).await.unwrap();
        store.delete_all().await.unwrap();
        assert!(store.retrieve("a/one").await.unwrap().is_none());
        assert!(store.retrieve("b/two").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let store = temp_store("escape");
        assert!(store.store("../outside", Bytes::from("x")).await.is_err());
        assert!(store.retrieve("/etc/passwd").await.is_err());
    }
}
