//! The cache node itself: everything a request can do once it has been
//! decoded, independent of any transport concern.
//!
//! [`CacheNode`] composes a local [`ArtifactStore`] with an optional
//! [`Cluster`] handle. In standalone mode the cluster is absent and the node
//! is just a remote artifact dictionary; in cluster mode stores trigger
//! advisory replication and deletes fan out to every other member.
use std::sync::Arc;

use tracing::{event, Level};

use crate::cluster::gossip::Peer;
use crate::cluster::Cluster;
use crate::cmd::cluster::cluster_state::ClusterStateResponse;
use crate::cmd::cluster::heartbeat::HeartbeatResponse;
use crate::cmd::cluster::join::JoinResponse;
use crate::cmd::delete::Delete;
use crate::cmd::replicate::Replicate;
use crate::cmd::retrieve::Retrieve;
use crate::cmd::store::Store;
use crate::cmd::types::Artifact;
use crate::error::{Error, InvalidRequest, Result};
use crate::store::{self, ArtifactStore};

pub type SharedArtifactStore = Arc<dyn ArtifactStore + Send + Sync>;

pub struct CacheNode {
    store: SharedArtifactStore,
    cluster: Option<Arc<Cluster>>,
}

impl CacheNode {
    pub fn new(store: SharedArtifactStore, cluster: Option<Arc<Cluster>>) -> Self {
        Self { store, cluster }
    }

    pub fn cluster(&self) -> Option<Arc<Cluster>> {
        self.cluster.clone()
    }

    fn require_cluster(&self) -> Result<&Arc<Cluster>> {
        self.cluster
            .as_ref()
            .ok_or(Error::InvalidRequest(InvalidRequest::NotInClusterMode))
    }

    /// Writes a batch of artifacts to the local store. The batch is aborted
    /// on the first failure; a half-stored action must not look like a cache
    /// hit later, and retrieval treats any missing file as a full miss.
    async fn store_batch(
        &self,
        os: &str,
        arch: &str,
        hash: &[u8],
        artifacts: Vec<Artifact>,
    ) -> bool {
        for artifact in artifacts {
            let path = store::artifact_path(
                os,
                arch,
                &artifact.package,
                &artifact.target,
                hash,
                &artifact.file,
            );
            if let Err(err) = self.store.store(&path, artifact.body).await {
                event!(Level::ERROR, "Unable to store artifact {}: {}", path, err);
                return false;
            }
        }
        true
    }

    /// Stores a batch locally and, in cluster mode, kicks off replication to
    /// this node's replica in the background.
    pub async fn store_artifacts(&self, cmd: Store) -> Result<bool> {
        let success = self
            .store_batch(&cmd.os, &cmd.arch, &cmd.hash, cmd.artifacts.clone())
            .await;
        if success {
            if let Some(cluster) = &self.cluster {
                let cluster = cluster.clone();
                tokio::spawn(async move { cluster.replicate_artifacts(cmd).await });
            }
        }
        Ok(success)
    }

    /// Reads a batch of artifacts back. All or nothing: a single missing
    /// file turns the whole batch into a miss, since a partial set of
    /// outputs is useless to a build client.
    pub async fn retrieve_artifacts(&self, cmd: Retrieve) -> Result<Option<Vec<Artifact>>> {
        let mut artifacts = Vec::with_capacity(cmd.artifacts.len());
        for key in &cmd.artifacts {
            let path = store::artifact_path(
                &cmd.os,
                &cmd.arch,
                &key.package,
                &key.target,
                &cmd.hash,
                &key.file,
            );
            match self.store.retrieve(&path).await? {
                Some(body) => artifacts.push(Artifact {
                    package: key.package.clone(),
                    target: key.target.clone(),
                    file: key.file.clone(),
                    body,
                }),
                None => return Ok(None),
            }
        }
        Ok(Some(artifacts))
    }

    /// Deletes locally and, unless this request was itself forwarded,
    /// forwards it to every other cluster member in the background.
    pub async fn delete_artifacts(&self, cmd: Delete) -> Result<bool> {
        let success = if cmd.everything {
            match self.store.delete_all().await {
                Ok(()) => true,
                Err(err) => {
                    event!(Level::ERROR, "Unable to clear the store: {}", err);
                    false
                }
            }
        } else {
            let mut success = true;
            for target in &cmd.targets {
                let dir = store::target_dir(&cmd.os, &cmd.arch, &target.package, &target.target);
                if let Err(err) = self.store.delete(&dir).await {
                    event!(Level::ERROR, "Unable to delete {}: {}", dir, err);
                    success = false;
                }
            }
            success
        };
        if !cmd.replication {
            if let Some(cluster) = &self.cluster {
                let cluster = cluster.clone();
                tokio::spawn(async move { cluster.delete_artifacts(cmd).await });
            }
        }
        Ok(success)
    }

    /// Applies a batch forwarded by a peer. Local only - replicated batches
    /// never replicate further.
    pub async fn replicate_artifacts(&self, cmd: Replicate) -> Result<bool> {
        self.require_cluster()?;
        event!(
            Level::INFO,
            "Storing {} artifacts replicated from peer {}",
            cmd.artifacts.len(),
            cmd.peer
        );
        Ok(self
            .store_batch(&cmd.os, &cmd.arch, &cmd.hash, cmd.artifacts)
            .await)
    }

    pub async fn join(&self, name: String, address: String) -> Result<JoinResponse> {
        let cluster = self.require_cluster()?;
        Ok(cluster.add_node(name, address).await?)
    }

    pub async fn heartbeat(&self, peers: Vec<Peer>) -> Result<HeartbeatResponse> {
        let cluster = self.require_cluster()?;
        let gossip = cluster.gossip();
        gossip.merge_peers(peers)?;
        Ok(HeartbeatResponse {
            peers: gossip.peers()?,
        })
    }

    pub async fn cluster_state(&self) -> Result<ClusterStateResponse> {
        let cluster = self.require_cluster()?;
        Ok(ClusterStateResponse {
            name: cluster.own_name().to_string(),
            peers: cluster.gossip().peers()?,
            nodes: cluster.get_members()?,
            size: cluster.size()?,
        })
    }
}
