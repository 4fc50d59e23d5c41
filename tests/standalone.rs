use bytes::Bytes;
use rcache::client::cache_client::CacheClient;
use rcache::client::Client;
use rcache::cmd::delete::Delete;
use rcache::cmd::retrieve::Retrieve;
use rcache::cmd::store::Store;
use rcache::cmd::types::{Artifact, ArtifactKey, ArtifactTarget};
use rcache::server::Server;
use tokio::sync::oneshot::{channel, Receiver};

async fn shutdown_future(receiver: Receiver<()>) {
    let _ = receiver.await;
}

fn store_cmd(hash: &[u8]) -> Store {
    Store::new(
        "linux".to_string(),
        "amd64".to_string(),
        Bytes::copy_from_slice(hash),
        vec![
            Artifact {
                package: "src/core".to_string(),
                target: "core".to_string(),
                file: "core.a".to_string(),
                body: Bytes::from("library contents"),
            },
            Artifact {
                package: "src/core".to_string(),
                target: "core".to_string(),
                file: "core.h".to_string(),
                body: Bytes::from("header contents"),
            },
        ],
    )
}

fn retrieve_cmd(hash: &[u8]) -> Retrieve {
    Retrieve::new(
        "linux".to_string(),
        "amd64".to_string(),
        Bytes::copy_from_slice(hash),
        vec![
            ArtifactKey {
                package: "src/core".to_string(),
                target: "core".to_string(),
                file: "core.a".to_string(),
            },
            ArtifactKey {
                package: "src/core".to_string(),
                target: "core".to_string(),
                file: "core.h".to_string(),
            },
        ],
    )
}

#[tokio::test]
async fn standalone_store_retrieve_delete() {
    let server = Server::from_config("tests/conf/standalone.json".into())
        .await
        .expect("Unable to construct server from config");
    let addr = server.client_listener_local_addr().unwrap().to_string();
    let (shutdown_sender, shutdown_receiver) = channel();
    let task_handle = tokio::spawn(async move {
        server.run(shutdown_future(shutdown_receiver)).await.unwrap();
    });

    let mut client = CacheClient::new(addr);
    client.connect().await.unwrap();

    assert_eq!(client.ping().await.unwrap().message, "PONG");

    // miss before anything is stored
    let response = client.retrieve(retrieve_cmd(&[1, 2, 3])).await.unwrap();
    assert!(!response.success);

    let response = client.store(store_cmd(&[1, 2, 3])).await.unwrap();
    assert!(response.success);

    let response = client.retrieve(retrieve_cmd(&[1, 2, 3])).await.unwrap();
    assert!(response.success);
    assert_eq!(response.artifacts.len(), 2);
    assert_eq!(response.artifacts[0].body, Bytes::from("library contents"));

    let response = client
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

    let response = client.retrieve(retrieve_cmd(&[1, 2, 3])).await.unwrap();
    assert!(!response.success);

    drop(shutdown_sender);
    task_handle.await.unwrap();
}

#[tokio::test]
async fn standalone_delete_everything() {
    let server = Server::from_config("tests/conf/standalone.json".into())
        .await
        .expect("Unable to construct server from config");
    let addr = server.client_listener_local_addr().unwrap().to_string();
    let (shutdown_sender, shutdown_receiver) = channel();
    let task_handle = tokio::spawn(async move {
        server.run(shutdown_future(shutdown_receiver)).await.unwrap();
    });

    let mut client = CacheClient::new(addr);
    client.connect().await.unwrap();

    client.store(store_cmd(&[1])).await.unwrap();
    client.store(store_cmd(&[2])).await.unwrap();

    let response = client
        .delete(Delete::new(
            "linux".to_string(),
            "amd64".to_string(),
            Vec::new(),
            true,
        ))
        .await
        .unwrap();
    assert!(response.success);

    for hash in [[1u8], [2u8]] {
        let response = client.retrieve(retrieve_cmd(&hash)).await.unwrap();
        assert!(!response.success);
    }

    drop(shutdown_sender);
    task_handle.await.unwrap();
}

#[tokio::test]
async fn standalone_rejects_cluster_commands() {
    let server = Server::from_config("tests/conf/standalone.json".into())
        .await
        .expect("Unable to construct server from config");
    let addr = server.client_listener_local_addr().unwrap().to_string();
    let (shutdown_sender, shutdown_receiver) = channel();
    let task_handle = tokio::spawn(async move {
        server.run(shutdown_future(shutdown_receiver)).await.unwrap();
    });

    let mut client = CacheClient::new(addr);
    client.connect().await.unwrap();

    let err = client.cluster_state().await.err().unwrap();
    match err {
        rcache::client::error::Error::InvalidServerResponse { reason } => {
            assert!(reason.contains("NotInClusterMode"));
        }
        other => panic!("Unexpected error: {}", other),
    }

    drop(shutdown_sender);
    task_handle.await.unwrap();
}
