//! Cluster health observation.
//!
//! The monitor owns the query path for all derived state: it asks the
//! container manager for per-node liveness, maps each node into a
//! [`NodeState`], and aggregates into a [`ClusterHealth`] snapshot that is
//! recomputed on every call and never cached.
//!
//! Three operations with deliberately different contracts:
//!
//! - [`status`](HealthMonitor::status): single-shot, never retries
//! - [`poll_until_healthy`](HealthMonitor::poll_until_healthy): bounded
//!   polling loop with cancellation; a timeout returns the last observed
//!   snapshot instead of failing, because a slow-starting cluster is not
//!   necessarily a broken one
//! - [`check_invariants`](HealthMonitor::check_invariants): point-in-time
//!   query for under-replicated and unavailable partitions

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::ClusterConfig;
use crate::constants::{FORMAT_MARKER_FILE, TOPICS_TOOL};
use crate::error::{Error, Result};
use crate::runner::CommandRunner;
use crate::types::{ClusterHealth, NodeHealth, NodeState, NodeSpec};

/// One row of `docker compose ps --format json` output.
///
/// Newer compose versions emit one JSON object per line; older ones emit a
/// single array. [`parse_ps_rows`] accepts both.
#[derive(Debug, Clone, Deserialize)]
struct PsRow {
    #[serde(rename = "Service", default)]
    service: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Health", default)]
    health: String,
}

fn parse_ps_rows(stdout: &str) -> Vec<PsRow> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if let Ok(rows) = serde_json::from_str::<Vec<PsRow>>(trimmed) {
        return rows;
    }
    trimmed
        .lines()
        .filter_map(|line| serde_json::from_str::<PsRow>(line.trim()).ok())
        .collect()
}

/// Map one node's container row (or its absence) into a [`NodeState`].
fn node_state(row: Option<&PsRow>, node: &NodeSpec) -> NodeState {
    match row {
        None => {
            // No container exists for this node. Distinguish "ready to
            // start" from "never initialized" by the format marker.
            if node.data_dir.join(FORMAT_MARKER_FILE).exists() {
                NodeState::Formatted
            } else {
                NodeState::Unformatted
            }
        }
        Some(row) => match row.state.as_str() {
            "running" => match row.health.as_str() {
                "" | "healthy" => NodeState::Healthy,
                "starting" => NodeState::Starting,
                _ => NodeState::Unhealthy,
            },
            "created" | "restarting" => NodeState::Starting,
            _ => NodeState::Stopped,
        },
    }
}

/// Point-in-time partition invariant check result.
///
/// Absence of any reported entries means the invariant holds right now; this
/// is not a continuous guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantReport {
    /// Partitions whose live replica count is below the configured
    /// replication factor.
    pub under_replicated: Vec<String>,
    /// Partitions with no reachable leader.
    pub unavailable: Vec<String>,
}

impl InvariantReport {
    pub fn holds(&self) -> bool {
        self.under_replicated.is_empty() && self.unavailable.is_empty()
    }
}

/// Polls node readiness and aggregates overall cluster health.
pub struct HealthMonitor {
    config: Arc<ClusterConfig>,
    runner: Arc<dyn CommandRunner>,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthMonitor {
    pub fn new(config: Arc<ClusterConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        HealthMonitor {
            config,
            runner,
            shutdown_tx,
        }
    }

    /// Cancel an in-flight [`poll_until_healthy`](Self::poll_until_healthy).
    ///
    /// The poll returns its last observed snapshot, so callers always see a
    /// definite state even when interrupted.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Single-shot, non-blocking snapshot of cluster health. Never retries.
    pub async fn status(&self) -> Result<ClusterHealth> {
        let cmd = self
            .config
            .compose()
            .args(["ps", "--all", "--format", "json"]);
        let output = self
            .runner
            .run(&cmd)
            .await
            .map_err(|e| Error::Supervisor(e.to_string()))?;
        if !output.success() {
            return Err(Error::Supervisor(output.error_text().to_string()));
        }

        let rows = parse_ps_rows(&output.stdout);
        let nodes = self
            .config
            .nodes
            .iter()
            .map(|node| {
                let row = rows.iter().find(|r| r.service == node.name);
                NodeHealth {
                    id: node.id,
                    name: node.name.clone(),
                    state: node_state(row, node),
                }
            })
            .collect();

        Ok(ClusterHealth::from_nodes(nodes))
    }

    /// Poll at a fixed interval until every node is healthy or the timeout
    /// elapses.
    ///
    /// The loop is bounded: at most `ceil(timeout / interval)` polls are
    /// issued. On timeout (or cancellation) the last observed snapshot is
    /// returned; callers decide whether partial health is acceptable.
    pub async fn poll_until_healthy(
        &self,
        timeout: Duration,
        interval: Duration,
    ) -> ClusterHealth {
        let attempts = max_attempts(timeout, interval);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        // Until the first successful probe, the honest answer is "nothing
        // observed yet": every node unknown-unhealthy, cluster down.
        let mut last = ClusterHealth::from_nodes(
            self.config
                .nodes
                .iter()
                .map(|n| NodeHealth {
                    id: n.id,
                    name: n.name.clone(),
                    state: NodeState::Unhealthy,
                })
                .collect(),
        );

        for attempt in 1..=attempts {
            match self.status().await {
                Ok(snapshot) => {
                    if snapshot.is_healthy() {
                        info!(attempt, "Cluster reported healthy");
                        return snapshot;
                    }
                    last = snapshot;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Health probe failed");
                }
            }

            if attempt < attempts {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Health polling cancelled");
                        return last;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        warn!(
            attempts,
            state = %last.state,
            "Cluster did not become healthy within timeout"
        );
        last
    }

    /// Query partition-level invariants: under-replicated and unavailable
    /// partitions. Empty output for both means the invariant holds.
    pub async fn check_invariants(&self) -> Result<InvariantReport> {
        let under_replicated = self
            .describe_filtered("--under-replicated-partitions")
            .await?;
        let unavailable = self.describe_filtered("--unavailable-partitions").await?;
        Ok(InvariantReport {
            under_replicated,
            unavailable,
        })
    }

    async fn describe_filtered(&self, filter: &str) -> Result<Vec<String>> {
        let cmd = self
            .config
            .admin_tool(TOPICS_TOOL)?
            .arg("--describe")
            .arg(filter);
        let output = self.runner.run(&cmd).await?;
        if !output.success() {
            return Err(Error::TopicOperation(output.error_text().to_string()));
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn max_attempts(timeout: Duration, interval: Duration) -> u32 {
    if interval.is_zero() {
        return 1;
    }
    let ratio = timeout.as_secs_f64() / interval.as_secs_f64();
    (ratio.ceil() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, MockRunner};
    use crate::types::ClusterState;

    fn config_in(dir: &std::path::Path) -> Arc<ClusterConfig> {
        let mut config = ClusterConfig::default();
        config.data_root = dir.to_path_buf();
        let data_root = config.data_root.clone();
        for node in &mut config.nodes {
            node.data_dir = data_root.join(&node.name);
        }
        Arc::new(config)
    }

    fn ps_line(service: &str, state: &str, health: &str) -> String {
        format!(
            "{{\"Service\":\"{}\",\"State\":\"{}\",\"Health\":\"{}\"}}",
            service, state, health
        )
    }

    // ========================================================================
    // Parsing Tests
    // ========================================================================

    #[test]
    fn test_parse_ndjson_rows() {
        let stdout = format!(
            "{}\n{}\n",
            ps_line("kafka-1", "running", "healthy"),
            ps_line("kafka-2", "exited", "")
        );
        let rows = parse_ps_rows(&stdout);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].service, "kafka-1");
        assert_eq!(rows[1].state, "exited");
    }

    #[test]
    fn test_parse_array_rows() {
        let stdout = format!(
            "[{},{}]",
            ps_line("kafka-1", "running", ""),
            ps_line("kafka-3", "running", "starting")
        );
        let rows = parse_ps_rows(&stdout);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].health, "starting");
    }

    #[test]
    fn test_parse_empty_and_garbage() {
        assert!(parse_ps_rows("").is_empty());
        assert!(parse_ps_rows("no containers running\n").is_empty());
    }

    // ========================================================================
    // Node State Mapping Tests
    // ========================================================================

    #[test]
    fn test_node_state_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let node = &config.nodes[0];

        let row = |state: &str, health: &str| PsRow {
            service: node.name.clone(),
            state: state.to_string(),
            health: health.to_string(),
        };

        assert_eq!(node_state(Some(&row("running", "healthy")), node), NodeState::Healthy);
        assert_eq!(node_state(Some(&row("running", "")), node), NodeState::Healthy);
        assert_eq!(node_state(Some(&row("running", "starting")), node), NodeState::Starting);
        assert_eq!(node_state(Some(&row("running", "unhealthy")), node), NodeState::Unhealthy);
        assert_eq!(node_state(Some(&row("restarting", "")), node), NodeState::Starting);
        assert_eq!(node_state(Some(&row("exited", "")), node), NodeState::Stopped);

        // No container: unformatted until the marker exists.
        assert_eq!(node_state(None, node), NodeState::Unformatted);
        std::fs::create_dir_all(&node.data_dir).unwrap();
        std::fs::write(node.data_dir.join(FORMAT_MARKER_FILE), "v=1").unwrap();
        assert_eq!(node_state(None, node), NodeState::Formatted);
    }

    // ========================================================================
    // Status Tests
    // ========================================================================

    #[tokio::test]
    async fn test_status_aggregates_mixed_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRunner::new());
        mock.on(
            "ps --all --format json",
            CommandOutput::ok_with(format!(
                "{}\n{}\n{}\n",
                ps_line("kafka-1", "running", "healthy"),
                ps_line("kafka-2", "running", "healthy"),
                ps_line("kafka-3", "exited", "")
            )),
        );
        let monitor = HealthMonitor::new(config_in(dir.path()), mock.clone());

        let health = monitor.status().await.unwrap();
        assert_eq!(health.state, ClusterState::Degraded);
        assert_eq!(health.nodes[2].state, NodeState::Stopped);
        // Single-shot: exactly one probe.
        assert_eq!(mock.calls_matching("ps --all"), 1);
    }

    #[tokio::test]
    async fn test_status_unreachable_manager_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRunner::new());
        mock.fail_spawn("docker", "No such file or directory");
        let monitor = HealthMonitor::new(config_in(dir.path()), mock);

        assert!(matches!(
            monitor.status().await,
            Err(Error::Supervisor(_))
        ));
    }

    // ========================================================================
    // Invariant Check Tests
    // ========================================================================

    #[tokio::test]
    async fn test_invariants_hold_on_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = HealthMonitor::new(config_in(dir.path()), Arc::new(MockRunner::new()));
        let report = monitor.check_invariants().await.unwrap();
        assert!(report.holds());
    }

    #[tokio::test]
    async fn test_under_replicated_partitions_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRunner::new());
        mock.on(
            "--under-replicated-partitions",
            CommandOutput::ok_with(
                "\tTopic: orders\tPartition: 2\tLeader: 1\tReplicas: 1,2,3\tIsr: 1,2\n",
            ),
        );
        let monitor = HealthMonitor::new(config_in(dir.path()), mock);

        let report = monitor.check_invariants().await.unwrap();
        assert!(!report.holds());
        assert_eq!(report.under_replicated.len(), 1);
        assert!(report.under_replicated[0].contains("orders"));
        assert!(report.unavailable.is_empty());
    }

    // ========================================================================
    // Attempt Bound Tests
    // ========================================================================

    #[test]
    fn test_max_attempts() {
        let secs = Duration::from_secs;
        assert_eq!(max_attempts(secs(3), secs(1)), 3);
        assert_eq!(max_attempts(secs(60), secs(2)), 30);
        assert_eq!(max_attempts(secs(1), secs(2)), 1);
        assert_eq!(max_attempts(secs(5), secs(2)), 3);
        assert_eq!(max_attempts(secs(0), secs(1)), 1);
    }
}
