//! Deployment configuration.
//!
//! [`ClusterConfig`] describes the static shape of one deployment: the
//! compose file, the identifier file, the node set, and the timing knobs.
//! It is loaded once at startup and treated as immutable for the process
//! lifetime. Defaults describe the stock 3-broker deployment; every value
//! can be overridden from the environment.
//!
//! # Environment Variables
//!
//! - `KRAFTER_COMPOSE_FILE`: compose file path (default `docker-compose.yml`)
//! - `KRAFTER_CLUSTER_ID_FILE`: identifier file path (default `cluster.id`)
//! - `KRAFTER_DATA_ROOT`: root of per-node data dirs (default `data`)
//! - `KRAFTER_NODE_COUNT`: number of brokers (default 3)
//! - `KRAFTER_BOOTSTRAP_SERVERS`: in-container bootstrap list for admin
//!   tools (default derived from the node set)
//! - `KRAFTER_HEALTH_TIMEOUT_SECS` / `KRAFTER_POLL_INTERVAL_SECS` /
//!   `KRAFTER_SETTLE_DELAY_SECS`: timing overrides

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_BASE_PORT, DEFAULT_CLUSTER_ID_FILE, DEFAULT_COMPOSE_FILE, DEFAULT_DATA_ROOT,
    DEFAULT_HEALTH_TIMEOUT_SECS, DEFAULT_NODE_COUNT, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_SERVER_CONFIG, DEFAULT_SETTLE_DELAY_SECS, INTERNAL_CLIENT_PORT, KAFKA_BIN_DIR,
    PORT_STRIDE, SERVICE_PREFIX,
};
use crate::error::{Error, Result};
use crate::runner::CommandSpec;
use crate::types::{NodeId, NodeSpec};

/// Static description of one deployment.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Compose file handed to the container manager.
    pub compose_file: PathBuf,
    /// Where the cluster identifier is persisted.
    pub cluster_id_file: PathBuf,
    /// Host root under which each node's data directory lives.
    pub data_root: PathBuf,
    /// Bootstrap list the admin tools use *inside* the compose network
    /// (service-name addresses, not the host-facing ports).
    pub bootstrap_servers: String,
    /// The static node set.
    pub nodes: Vec<NodeSpec>,
    /// Overall budget for waiting on health after `start`.
    pub health_timeout: Duration,
    /// Interval between health polls.
    pub poll_interval: Duration,
    /// Settling delay between stop and start during `restart`.
    pub settle_delay: Duration,
}

fn default_nodes(count: u32, data_root: &Path) -> Vec<NodeSpec> {
    (1..=count)
        .map(|i| {
            let name = format!("{}-{}", SERVICE_PREFIX, i);
            NodeSpec {
                id: NodeId::new(i),
                address: format!(
                    "localhost:{}",
                    DEFAULT_BASE_PORT + PORT_STRIDE * (i as u16 - 1)
                ),
                data_dir: data_root.join(&name),
                config_path: PathBuf::from(DEFAULT_SERVER_CONFIG),
                name,
            }
        })
        .collect()
}

fn derived_bootstrap(nodes: &[NodeSpec]) -> String {
    nodes
        .iter()
        .map(|n| format!("{}:{}", n.name, INTERNAL_CLIENT_PORT))
        .collect::<Vec<_>>()
        .join(",")
}

impl Default for ClusterConfig {
    fn default() -> Self {
        let data_root = PathBuf::from(DEFAULT_DATA_ROOT);
        let nodes = default_nodes(DEFAULT_NODE_COUNT, &data_root);
        let bootstrap_servers = derived_bootstrap(&nodes);
        ClusterConfig {
            compose_file: PathBuf::from(DEFAULT_COMPOSE_FILE),
            cluster_id_file: PathBuf::from(DEFAULT_CLUSTER_ID_FILE),
            data_root,
            bootstrap_servers,
            nodes,
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            settle_delay: Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS),
        }
    }
}

impl ClusterConfig {
    /// Build configuration from the environment, starting from defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = ClusterConfig::default();

        if let Ok(path) = std::env::var("KRAFTER_COMPOSE_FILE") {
            config.compose_file = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("KRAFTER_CLUSTER_ID_FILE") {
            config.cluster_id_file = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("KRAFTER_DATA_ROOT") {
            config.data_root = PathBuf::from(path);
            config.nodes = default_nodes(config.nodes.len() as u32, &config.data_root);
        }
        if let Ok(raw) = std::env::var("KRAFTER_NODE_COUNT") {
            let count: u32 = parse_env("KRAFTER_NODE_COUNT", &raw)?;
            config.nodes = default_nodes(count, &config.data_root);
            config.bootstrap_servers = derived_bootstrap(&config.nodes);
        }
        if let Ok(servers) = std::env::var("KRAFTER_BOOTSTRAP_SERVERS") {
            config.bootstrap_servers = servers;
        }
        if let Ok(raw) = std::env::var("KRAFTER_HEALTH_TIMEOUT_SECS") {
            config.health_timeout =
                Duration::from_secs(parse_env("KRAFTER_HEALTH_TIMEOUT_SECS", &raw)?);
        }
        if let Ok(raw) = std::env::var("KRAFTER_POLL_INTERVAL_SECS") {
            config.poll_interval =
                Duration::from_secs(parse_env("KRAFTER_POLL_INTERVAL_SECS", &raw)?);
        }
        if let Ok(raw) = std::env::var("KRAFTER_SETTLE_DELAY_SECS") {
            config.settle_delay =
                Duration::from_secs(parse_env("KRAFTER_SETTLE_DELAY_SECS", &raw)?);
        }

        Ok(config)
    }

    /// Validate the configuration, collecting every violation instead of
    /// stopping at the first.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut violations = Vec::new();

        if self.nodes.is_empty() {
            violations.push("node set is empty".to_string());
        }
        for (i, a) in self.nodes.iter().enumerate() {
            for b in &self.nodes[i + 1..] {
                if a.id == b.id {
                    violations.push(format!("duplicate node id {}", a.id));
                }
                if a.name == b.name {
                    violations.push(format!("duplicate node name '{}'", a.name));
                }
                if a.address == b.address {
                    violations.push(format!("duplicate node address '{}'", a.address));
                }
                if a.data_dir == b.data_dir {
                    violations.push(format!(
                        "nodes {} and {} share data dir {}",
                        a.id,
                        b.id,
                        a.data_dir.display()
                    ));
                }
            }
        }
        if self.bootstrap_servers.trim().is_empty() {
            violations.push("bootstrap server list is empty".to_string());
        }
        if self.health_timeout.is_zero() {
            violations.push("health timeout must be greater than zero".to_string());
        }
        if self.poll_interval.is_zero() {
            violations.push("poll interval must be greater than zero".to_string());
        }
        if self.poll_interval > self.health_timeout {
            violations.push(format!(
                "poll interval ({:?}) exceeds health timeout ({:?})",
                self.poll_interval, self.health_timeout
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Look up a node by compose service name.
    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    // ========================================================================
    // Command builders
    // ========================================================================

    /// Base `docker compose` invocation pinned to this deployment's file.
    pub fn compose(&self) -> CommandSpec {
        CommandSpec::new("docker")
            .arg("compose")
            .arg("-f")
            .arg(self.compose_file.display().to_string())
    }

    /// An admin tool invocation, exec'd inside the first broker with the
    /// bootstrap list pre-applied (`kafka-topics.sh`,
    /// `kafka-consumer-groups.sh`, ...).
    pub fn admin_tool(&self, tool: &str) -> Result<CommandSpec> {
        let node = self.nodes.first().ok_or_else(|| {
            Error::Prerequisite("cannot run admin tools with an empty node set".to_string())
        })?;
        Ok(self
            .compose()
            .args(["exec", "-T", node.name.as_str()])
            .arg(format!("{}/{}", KAFKA_BIN_DIR, tool))
            .arg("--bootstrap-server")
            .arg(&self.bootstrap_servers))
    }

    /// A tool invocation in a throwaway container for `node` (used for
    /// storage formatting and ID generation, which must work while the
    /// cluster is down).
    pub fn oneshot_tool(&self, node: &NodeSpec, tool: &str) -> CommandSpec {
        self.compose()
            .args(["run", "--rm", "--no-deps", node.name.as_str()])
            .arg(format!("{}/{}", KAFKA_BIN_DIR, tool))
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| {
        Error::Prerequisite(format!("invalid value '{}' for {}", raw, var))
    })
}
