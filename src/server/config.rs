use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(flatten)]
    pub cluster_type: ClusterType,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    Standalone(StandaloneConfig),
    Cluster(ClusterConfig),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StandaloneConfig {
    pub port: u16,
    pub storage_engine: StorageEngine,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageEngine {
    InMemory,
    Dir { path: String },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClusterConfig {
    pub port: u16,
    pub storage_engine: StorageEngine,
    pub gossip: Gossip,
    /// Stable node name. A node that restarts under the same name takes its
    /// old ring slot back; leaving this unset generates a random name, which
    /// costs the node its slot on every restart.
    pub name: Option<String>,
    /// Address other nodes should use to reach this one. Defaults to the
    /// machine's local ip.
    pub advertise_addr: Option<String>,
    pub bootstrap: Bootstrap,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Gossip {
    pub port: u16,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bootstrap {
    /// Seed a brand-new cluster with the given fixed size.
    Seed { size: usize },
    /// Join an existing cluster through the given seed gossip addresses.
    Join { seeds: Vec<String> },
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{Bootstrap, ClusterType, Config, StorageEngine};

    fn load(name: &str) -> Config {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push(format!("conf/{}", name));
        let raw = std::fs::read_to_string(path).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn deserialize_standalone() {
        let config = load("standalone.json");
        match config.cluster_type {
            ClusterType::Standalone(cfg) => {
                assert_eq!(cfg.port, 3001);
                assert!(matches!(cfg.storage_engine, StorageEngine::InMemory));
            }
            _ => panic!("expected a standalone config"),
        }
    }

    #[test]
    fn deserialize_cluster_seed() {
        let config = load("cluster_seed.json");
        match config.cluster_type {
            ClusterType::Cluster(cfg) => {
                assert_eq!(cfg.port, 3001);
                assert_eq!(cfg.gossip.port, 4001);
                assert_eq!(cfg.name.as_deref(), Some("c1"));
                assert!(matches!(cfg.bootstrap, Bootstrap::Seed { size: 3 }));
            }
            _ => panic!("expected a cluster config"),
        }
    }

    #[test]
    fn deserialize_cluster_join() {
        let config = load("cluster_join_2.json");
        match config.cluster_type {
            ClusterType::Cluster(cfg) => {
                assert!(matches!(cfg.storage_engine, StorageEngine::Dir { .. }));
                match cfg.bootstrap {
                    Bootstrap::Join { seeds } => assert_eq!(seeds, vec!["127.0.0.1:4001"]),
                    _ => panic!("expected a join bootstrap"),
                }
            }
            _ => panic!("expected a cluster config"),
        }
    }
}
