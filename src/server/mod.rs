//! The TCP surface of an rcache node.
//!
//! A node runs one listener in standalone mode and two in cluster mode:
//!   - the client listener serves the full command set
//!   - the gossip listener serves heartbeats only, so a stray build client
//!     pointed at the wrong port can't poke at cluster internals
//!
//! Cluster bootstrap (seeding or joining) happens inside [`Server::run`]
//! before any connection is accepted. A node that fails to join exits with an
//! error instead of coming up as a member it never became.
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use local_ip_address::local_ip;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{event, instrument, Instrument, Level};

use crate::cache::{CacheNode, SharedArtifactStore};
use crate::client::cache_client::CacheClientFactory;
use crate::cluster::gossip::{start_heartbeat, Peer};
use crate::cluster::Cluster;
use crate::cmd::{self, Command};
use crate::error::{Error, InvalidRequest};
use crate::store::dir::DirStore;
use crate::store::in_memory::InMemory;
use crate::utils::generate_random_ascii_string;

use self::config::{Bootstrap, ClusterType, Config, StorageEngine};
use self::message::Message;

pub mod config;
pub mod message;

enum ServerMode {
    Standalone,
    Cluster {
        gossip_listener: TcpListener,
        bootstrap: Bootstrap,
    },
}

pub struct Server {
    client_listener: TcpListener,
    node: Arc<CacheNode>,
    mode: ServerMode,
}

impl Server {
    pub async fn from_config(path: PathBuf) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&raw)?;

        match config.cluster_type {
            ClusterType::Standalone(cfg) => {
                let client_listener = TcpListener::bind(format!("0.0.0.0:{}", cfg.port)).await?;
                let store = build_store(cfg.storage_engine);
                Ok(Self {
                    client_listener,
                    node: Arc::new(CacheNode::new(store, None)),
                    mode: ServerMode::Standalone,
                })
            }
            ClusterType::Cluster(cfg) => {
                let client_listener = TcpListener::bind(format!("0.0.0.0:{}", cfg.port)).await?;
                let gossip_listener =
                    TcpListener::bind(format!("0.0.0.0:{}", cfg.gossip.port)).await?;

                let advertise_addr = match cfg.advertise_addr {
                    Some(addr) => addr,
                    None => match local_ip() {
                        Ok(ip) => ip.to_string(),
                        Err(err) => {
                            event!(
                                Level::WARN,
                                "Unable to determine the local ip ({}), advertising 127.0.0.1",
                                err
                            );
                            "127.0.0.1".to_string()
                        }
                    },
                };
                // The config may say port 0; advertise what we actually bound.
                let rpc_port = client_listener.local_addr()?.port();
                let gossip_port = gossip_listener.local_addr()?.port();
                let name = cfg
                    .name
                    .unwrap_or_else(|| format!("rcache-{}", generate_random_ascii_string(8)));

                let own = Peer::new(
                    name,
                    format!("{}:{}", advertise_addr, gossip_port),
                    format!("{}:{}", advertise_addr, rpc_port),
                );
                let cluster = Arc::new(Cluster::new(own, Box::new(CacheClientFactory)));
                let store = build_store(cfg.storage_engine);
                Ok(Self {
                    client_listener,
                    node: Arc::new(CacheNode::new(store, Some(cluster))),
                    mode: ServerMode::Cluster {
                        gossip_listener,
                        bootstrap: cfg.bootstrap,
                    },
                })
            }
        }
    }

    /// Actual address of the client listener. Tests bind port 0 and need the
    /// assigned port back.
    pub fn client_listener_local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.client_listener.local_addr()?)
    }

    /// Actual address of the gossip listener; errors in standalone mode.
    pub fn gossip_listener_local_addr(&self) -> anyhow::Result<SocketAddr> {
        match &self.mode {
            ServerMode::Cluster {
                gossip_listener, ..
            } => Ok(gossip_listener.local_addr()?),
            ServerMode::Standalone => {
                anyhow::bail!("a standalone server has no gossip listener")
            }
        }
    }

    /// Runs the server until the shutdown future resolves.
    pub async fn run(self, shutdown: impl Future) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        match self.mode {
            ServerMode::Standalone => {
                event!(Level::INFO, "rcache standalone node started");
                tokio::select! {
                    _ = &mut shutdown => {
                        event!(Level::INFO, "Shutting down");
                        Ok(())
                    }
                    result = accept_clients(self.client_listener, self.node) => result,
                }
            }
            ServerMode::Cluster {
                gossip_listener,
                bootstrap,
            } => {
                let cluster = self
                    .node
                    .cluster()
                    .ok_or_else(|| anyhow::anyhow!("cluster mode without a cluster handle"))?;
                match bootstrap {
                    Bootstrap::Seed { size } => cluster.init(size)?,
                    Bootstrap::Join { seeds } => cluster.join(&seeds).await?,
                }
                tokio::spawn(start_heartbeat(cluster.clone()));
                event!(Level::INFO, "rcache node {} started", cluster.own_name());

                tokio::select! {
                    _ = &mut shutdown => {
                        event!(Level::INFO, "Shutting down");
                        Ok(())
                    }
                    result = accept_cluster(self.client_listener, gossip_listener, self.node) => result,
                }
            }
        }
    }
}

fn build_store(engine: StorageEngine) -> SharedArtifactStore {
    match engine {
        StorageEngine::InMemory => Arc::new(InMemory::default()),
        StorageEngine::Dir { path } => Arc::new(DirStore::new(path)),
    }
}

async fn accept_clients(listener: TcpListener, node: Arc<CacheNode>) -> anyhow::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        tokio::spawn(handle_client_connection(stream, node.clone()));
    }
}

async fn accept_cluster(
    client_listener: TcpListener,
    gossip_listener: TcpListener,
    node: Arc<CacheNode>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            accepted = client_listener.accept() => {
                let (stream, _) = accepted?;
                tokio::spawn(handle_client_connection(stream, node.clone()));
            }
            accepted = gossip_listener.accept() => {
                let (stream, _) = accepted?;
                tokio::spawn(handle_gossip_connection(stream, node.clone()));
            }
        }
    }
}

#[instrument(level = "debug", skip(node))]
async fn handle_client_connection(
    mut stream: TcpStream,
    node: Arc<CacheNode>,
) -> anyhow::Result<()> {
    loop {
        let request = Message::try_from_async_read(&mut stream).await?;
        let request_id = request.request_id.clone();
        let cmd_id = request.id;

        let mut response = match Command::try_from_message(request) {
            Ok(command) => {
                let span = tracing::span!(Level::INFO, "request", %request_id, cmd_id);
                command.execute(node.clone()).instrument(span).await
            }
            Err(err) => {
                event!(Level::WARN, "Unable to parse command: {}", err);
                cmd::serialize_response::<()>(cmd_id, Err(err))
            }
        };
        response.request_id = request_id;
        stream.write_all(&response.serialize()).await?;
    }
}

/// Like [`handle_client_connection`], but the only command served here is
/// the gossip heartbeat.
#[instrument(level = "debug", skip(node))]
async fn handle_gossip_connection(
    mut stream: TcpStream,
    node: Arc<CacheNode>,
) -> anyhow::Result<()> {
    loop {
        let request = Message::try_from_async_read(&mut stream).await?;
        let request_id = request.request_id.clone();
        let cmd_id = request.id;

        let mut response = if cmd_id == cmd::CLUSTER_HEARTBEAT_CMD {
            match Command::try_from_message(request) {
                Ok(command) => command.execute(node.clone()).await,
                Err(err) => {
                    event!(Level::WARN, "Unable to parse heartbeat: {}", err);
                    cmd::serialize_response::<()>(cmd_id, Err(err))
                }
            }
        } else {
            event!(
                Level::WARN,
                "Command {} is not served on the gossip listener",
                cmd_id
            );
            cmd::serialize_response::<()>(
                cmd_id,
                Err(Error::InvalidRequest(InvalidRequest::UnrecognizedCommand {
                    id: cmd_id,
                })),
            )
        };
        response.request_id = request_id;
        stream.write_all(&response.serialize()).await?;
    }
}
