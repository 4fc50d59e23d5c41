//! An in-memory [`ArtifactStore`] implementation
//!
//! A [`HashMap`] behind a [`Mutex`], nothing clever. Used for tests and
//! development; real deployments want [`super::dir::DirStore`].
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::instrument;

use super::{ArtifactStore, Error, Result};

type Artifacts = HashMap<String, Bytes>;

#[derive(Clone, Debug, Default)]
pub struct InMemory {
    inner: Arc<Mutex<Artifacts>>,
}

impl InMemory {
    fn acquire_lock(&self) -> Result<MutexGuard<Artifacts>> {
        self.inner.lock().map_err(|_| Error::Logic {
            reason: "Unable to acquire lock for InMemory artifact store - poisoned...".to_string(),
        })
    }
}

#[async_trait]
impl ArtifactStore for InMemory {
    #[instrument(name = "store::in_memory::store", level = "debug", skip(self, body))]
    async fn store(&self, path: &str, body: Bytes) -> Result<()> {
        let mut guard = self.acquire_lock()?;
        guard.insert(path.to_string(), body);
        Ok(())
    }

    #[instrument(name = "store::in_memory::retrieve", level = "debug", skip(self))]
    async fn retrieve(&self, path: &str) -> Result<Option<Bytes>> {
        let guard = self.acquire_lock()?;
        Ok(guard.get(path).cloned())
    }

    #[instrument(name = "store::in_memory::delete", level = "debug", skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        let mut guard = self.acquire_lock()?;
        let prefix = format!("{}/", path);
        guard.retain(|k, _| k != path && !k.starts_with(&prefix));
        Ok(())
    }

    #[instrument(name = "store::in_memory::delete_all", level = "debug", skip(self))]
    async fn delete_all(&self) -> Result<()> {
        let mut guard = self.acquire_lock()?;
        guard.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemory;
    use crate::store::ArtifactStore;
    use crate::utils::generate_random_ascii_string;
    use bytes::Bytes;
    use quickcheck::Arbitrary;

    #[tokio::test]
    async fn store_retrieve_delete() {
        let store = InMemory::default();
        let path = "linux_amd64/pkg/target/aGFzaA/out.a";
        let body = Bytes::from("artifact body");

        store.store(path, body.clone()).await.unwrap();
        assert_eq!(store.retrieve(path).await.unwrap().unwrap(), body);

        store.delete(path).await.unwrap();
        assert!(store.retrieve(path).await.unwrap().is_none());
        // deleting again is fine
        store.delete(path).await.unwrap();
    }

    #[tokio::test]
    async fn delete_by_target_prefix() {
        let store = InMemory::default();
        store
            .store("linux_amd64/pkg/target/h1/out.a", Bytes::from("1"))
            .await
            .unwrap();
        store
            .store("linux_amd64/pkg/target/h2/out.a", Bytes::from("2"))
            .await
            .unwrap();
        store
            .store("linux_amd64/pkg/other/h1/out.a", Bytes::from("3"))
            .await
            .unwrap();

        store.delete("linux_amd64/pkg/target").await.unwrap();
        assert!(store
            .retrieve("linux_amd64/pkg/target/h1/out.a")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .retrieve("linux_amd64/pkg/target/h2/out.a")
            .await
            .unwrap()
            .is_none());
        // a sibling target is untouched
        assert!(store
            .retrieve("linux_amd64/pkg/other/h1/out.a")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn store_overwrites() {
        let store = InMemory::default();
        let path = "p";
        store.store(path, Bytes::from("one")).await.unwrap();
        store.store(path, Bytes::from("two")).await.unwrap();
        assert_eq!(store.retrieve(path).await.unwrap().unwrap(), Bytes::from("two"));
    }

    #[tokio::test]
    async fn delete_all_clears_everything() {
        let store = InMemory::default();
        store.store("a", Bytes::from("1")).await.unwrap();
        store.store("b", Bytes::from("2")).await.unwrap();
        store.delete_all().await.unwrap();
        assert!(store.retrieve("a").await.unwrap().is_none());
        assert!(store.retrieve("b").await.unwrap().is_none());
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestInput {
        paths_task_1: Vec<String>,
        paths_task_2: Vec<String>,
        paths_task_3: Vec<String>,
    }

    fn generate_random_deduped_paths(n_paths: usize) -> Vec<String> {
        let mut paths = Vec::with_capacity(n_paths);
        for _ in 0..n_paths {
            paths.push(generate_random_ascii_string(20))
        }
        paths.sort();
        paths.dedup();
        paths
    }

    impl Arbitrary for TestInput {
        fn arbitrary(_: &mut quickcheck::Gen) -> Self {
            let paths = generate_random_deduped_paths(600);

            Self {
                paths_task_1: Vec::from(&paths[0..200]),
                paths_task_2: Vec::from(&paths[200..400]),
                paths_task_3: Vec::from(&paths[400..600]),
            }
        }
    }

    async fn store_retrieve(store: InMemory, paths: Vec<String>) -> anyhow::Result<usize> {
        let mut stored = 0;

        for path in paths.iter() {
            let body = Bytes::from(path.clone());
            store.store(path, body.clone()).await?;
            assert_eq!(store.retrieve(path).await?.unwrap(), body);
            stored += 1;
        }

        Ok(stored)
    }

    // Asserts that
    //  1. concurrent stores/retrieves don't hang on the inner mutex
    //  2. every artifact written by any task is readable afterwards
    #[quickcheck_async::tokio]
    async fn concurrent_store_retrieve(input: TestInput) {
        let store = InMemory::default();
        let h1 = {
            let store = store.clone();
            let input = input.paths_task_1.clone();
            tokio::spawn(store_retrieve(store, input))
        };

        let h2 = {
            let store = store.clone();
            let input = input.paths_task_2.clone();
            tokio::spawn(store_retrieve(store, input))
        };

        let h3 = {
            let store = store.clone();
            let input = input.paths_task_3.clone();
            tokio::spawn(store_retrieve(store, input))
        };

        let (r1, r2, r3) = tokio::join!(h1, h2, h3);
        let total = r1.unwrap().unwrap() + r2.unwrap().unwrap() + r3.unwrap().unwrap();
        assert_eq!(
            total,
            input.paths_task_1.len() + input.paths_task_2.len() + input.paths_task_3.len()
        );

        for path in input
            .paths_task_1
            .iter()
            .chain(input.paths_task_2.iter())
            .chain(input.paths_task_3.iter())
        {
            assert!(store.retrieve(path).await.unwrap().is_some());
        }
    }
}
