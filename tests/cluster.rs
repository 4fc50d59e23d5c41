use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use rcache::client::cache_client::CacheClient;
use rcache::client::Client;
use rcache::cluster::hash_space;
use rcache::cmd::cluster::cluster_state::ClusterStateResponse;
use rcache::cmd::delete::Delete;
use rcache::cmd::retrieve::Retrieve;
use rcache::cmd::store::Store;
use rcache::cmd::types::{Artifact, ArtifactKey, ArtifactTarget};
use rcache::server::Server;
use tokio::sync::oneshot::{channel, Receiver, Sender};
use tokio::task::JoinHandle;

async fn shutdown_future(receiver: Receiver<()>) {
    let _ = receiver.await;
}

struct ServerHandle {
    task_handle: JoinHandle<()>,
    shutdown: Sender<()>,
    client_listener_addr: String,
}

impl ServerHandle {
    async fn stop(self) {
        drop(self.shutdown);
        self.task_handle.await.unwrap();
    }
}

/// Starts the servers one by one, waiting for each to accept connections
/// before starting the next. Joiners dial their seed during startup, so the
/// seed must be up first.
async fn start_servers(configs: Vec<PathBuf>) -> Vec<ServerHandle> {
    let mut handles = Vec::new();
    for config in configs {
        let server = Server::from_config(config)
            .await
            .expect("Unable to construct server from config");
        let client_listener_addr = server.client_listener_local_addr().unwrap().to_string();
        let (shutdown_sender, shutdown_receiver) = channel();
        let task_handle = tokio::spawn(async move {
            server.run(shutdown_future(shutdown_receiver)).await.unwrap();
        });
        wait_listening(&client_listener_addr).await;

        handles.push(ServerHandle {
            task_handle,
            shutdown: shutdown_sender,
            client_listener_addr,
        });
    }

    handles
}

async fn wait_listening(addr: &str) {
    for _ in 0..100 {
        let mut client = CacheClient::new(addr.to_string());
        if client.connect().await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("server at {} never started accepting connections", addr);
}

async fn wait_cluster_ready(client: &mut CacheClient, n_nodes: usize) -> ClusterStateResponse {
    for _ in 0..100 {
        let state = client.cluster_state().await.unwrap();
        if state.nodes.len() == n_nodes && state.nodes.iter().all(|n| !n.name.is_empty()) {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("cluster never reached {} populated slots", n_nodes);
}

fn store_cmd(hash: &[u8]) -> Store {
    Store::new(
        "linux".to_string(),
        "amd64".to_string(),
        Bytes::copy_from_slice(hash),
        vec![Artifact {
            package: "src/core".to_string(),
            target: "core".to_string(),
            file: "core.a".to_string(),
            body: Bytes::from("library contents"),
        }],
    )
}

fn retrieve_cmd(hash: &[u8]) -> Retrieve {
    Retrieve::new(
        "linux".to_string(),
        "amd64".to_string(),
        Bytes::copy_from_slice(hash),
        vec![ArtifactKey {
            package: "src/core".to_string(),
            target: "core".to_string(),
            file: "core.a".to_string(),
        }],
    )
}

/// Whether the node at `addr` has the artifact in its local store.
/// Retrieval never forwards between nodes, so this probes exactly one store.
async fn has_artifact(addr: &str, hash: &[u8]) -> bool {
    let mut client = CacheClient::new(addr.to_string());
    if client.connect().await.is_err() {
        return false;
    }
    match client.retrieve(retrieve_cmd(hash)).await {
        Ok(response) => response.success,
        Err(_) => false,
    }
}

async fn count_copies(addrs: &[String], hash: &[u8]) -> usize {
    let mut copies = 0;
    for addr in addrs {
        if has_artifact(addr, hash).await {
            copies += 1;
        }
    }
    copies
}

#[tokio::test]
async fn cluster_forms_replicates_and_deletes() {
    let handles = start_servers(vec![
        "tests/conf/cluster_c1.json".into(),
        "tests/conf/cluster_c2.json".into(),
        "tests/conf/cluster_c3.json".into(),
    ])
    .await;

    let mut client = CacheClient::new(handles[0].client_listener_addr.clone());
    client.connect().await.unwrap();
    let state = wait_cluster_ready(&mut client, 3).await;

    // Slot boundaries are derived from (index, size) on every node alike.
    assert_eq!(state.size, 3);
    let mut names: Vec<&str> = state.nodes.iter().map(|n| n.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["c1", "c2", "c3"]);
    for (i, node) in state.nodes.iter().enumerate() {
        assert_eq!(node.hash_begin, hash_space::hash_point(i, 3));
        assert_eq!(node.hash_end, hash_space::hash_point(i + 1, 3));
    }
    let addrs: Vec<String> = state.nodes.iter().map(|n| n.address.clone()).collect();

    // A store on c1 lands on c1 plus exactly one replica.
    let hash = [0u8, 0, 0, 0];
    let response = client.store(store_cmd(&hash)).await.unwrap();
    assert!(response.success);
    assert!(has_artifact(&handles[0].client_listener_addr, &hash).await);

    let mut copies = 0;
    for _ in 0..100 {
        copies = count_copies(&addrs, &hash).await;
        if copies == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(copies, 2, "expected the artifact on exactly two nodes");

    // A delete issued against any member clears every copy.
    let mut other = CacheClient::new(handles[1].client_listener_addr.clone());
    other.connect().await.unwrap();
    // The fan-out only reaches members this node already knows about.
    wait_cluster_ready(&mut other, 3).await;
    let response = other
        .delete(Delete::new(
            "linux".to_string(),
            "amd64".to_string(),
            vec![ArtifactTarget {
                package: "src/core".to_string(),
                target: "core".to_string(),
            }],
            false,
        ))
        .await
        .unwrap();
    assert!(response.success);

    let mut copies = usize::MAX;
    for _ in 0..100 {
        copies = count_copies(&addrs, &hash).await;
        if copies == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(copies, 0, "expected the delete to reach every node");

    for handle in handles {
        handle.stop().await;
    }
}

#[tokio::test]
async fn join_is_refused_once_the_cluster_is_full() {
    let handles = start_servers(vec![
        "tests/conf/small_c1.json".into(),
        "tests/conf/small_c2.json".into(),
    ])
    .await;

    let mut client = CacheClient::new(handles[0].client_listener_addr.clone());
    client.connect().await.unwrap();
    wait_cluster_ready(&mut client, 2).await;

    // The third node finds the cluster but nobody has a slot for it, so its
    // startup fails instead of limping along as a non-member.
    let server = Server::from_config("tests/conf/small_c3.json".into())
        .await
        .expect("Unable to construct server from config");
    let err = server.run(std::future::pending::<()>()).await.err().unwrap();
    assert!(format!("{}", err).contains("JoinExhausted"));

    for handle in handles {
        handle.stop().await;
    }
}
