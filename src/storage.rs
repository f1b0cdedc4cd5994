//! Per-node storage initialization.
//!
//! Each broker's log directory is formatted exactly once with the shared
//! cluster identifier. The three nodes are independent, so formatting runs
//! with a worker per node and the results are collected into a
//! [`FormatReport`]; one node's failure is reported but never aborts the
//! others.
//!
//! Re-invoking format on an already-formatted directory is a safe no-op
//! reported as [`FormatOutcome::AlreadyFormatted`]. Storage is never
//! silently re-formatted, because that would discard the node's data and its
//! binding to the cluster identifier. The guard is the marker file the
//! format tool itself writes (`meta.properties`).

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::ClusterConfig;
use crate::constants::{FORMAT_MARKER_FILE, STORAGE_TOOL};
use crate::runner::CommandRunner;
use crate::types::{ClusterId, NodeId, NodeSpec};

/// Outcome of formatting one node's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    /// Storage was formatted with the cluster identifier.
    Formatted,
    /// A format marker already exists; the directory was left untouched.
    AlreadyFormatted,
    /// Formatting failed; the message carries the tool's own error text.
    Failed(String),
}

impl std::fmt::Display for FormatOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatOutcome::Formatted => write!(f, "formatted"),
            FormatOutcome::AlreadyFormatted => write!(f, "already formatted"),
            FormatOutcome::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// One node's entry in the aggregate report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFormatResult {
    pub id: NodeId,
    pub node: String,
    pub outcome: FormatOutcome,
}

/// Aggregate outcome of formatting the node set.
///
/// Partial success is a valid terminal state: the report lists each node's
/// outcome, and overall `init` succeeds only if no node failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatReport {
    pub nodes: Vec<NodeFormatResult>,
}

impl FormatReport {
    /// True iff no node failed (already-formatted nodes count as success).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn failed_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.outcome, FormatOutcome::Failed(_)))
            .count()
    }

    pub fn formatted_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.outcome == FormatOutcome::Formatted)
            .count()
    }

    pub fn already_formatted_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.outcome == FormatOutcome::AlreadyFormatted)
            .count()
    }
}

/// Formats each node's storage directory, idempotently, using the cluster
/// identifier.
pub struct StorageInitializer {
    config: Arc<ClusterConfig>,
    runner: Arc<dyn CommandRunner>,
}

impl StorageInitializer {
    pub fn new(config: Arc<ClusterConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        StorageInitializer { config, runner }
    }

    /// Format every node concurrently and aggregate the outcomes.
    ///
    /// Ordering between nodes is irrelevant; the report is sorted by node id
    /// for stable output.
    pub async fn format_all(&self, id: &ClusterId) -> FormatReport {
        let mut tasks = JoinSet::new();
        for node in &self.config.nodes {
            let config = Arc::clone(&self.config);
            let runner = Arc::clone(&self.runner);
            let node = node.clone();
            let id = id.clone();
            tasks.spawn(async move { format_node(&config, runner.as_ref(), &node, &id).await });
        }

        let mut nodes = Vec::with_capacity(self.config.nodes.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => nodes.push(result),
                Err(e) => error!(error = %e, "Format worker task failed"),
            }
        }
        nodes.sort_by_key(|n| n.id);

        let report = FormatReport { nodes };
        info!(
            formatted = report.formatted_count(),
            already_formatted = report.already_formatted_count(),
            failed = report.failed_count(),
            "Storage format finished"
        );
        report
    }
}

async fn format_node(
    config: &ClusterConfig,
    runner: &dyn CommandRunner,
    node: &NodeSpec,
    id: &ClusterId,
) -> NodeFormatResult {
    let result = |outcome| NodeFormatResult {
        id: node.id,
        node: node.name.clone(),
        outcome,
    };

    if node.data_dir.join(FORMAT_MARKER_FILE).exists() {
        info!(node = %node.name, dir = %node.data_dir.display(), "Storage already formatted, leaving untouched");
        return result(FormatOutcome::AlreadyFormatted);
    }

    if let Err(e) = std::fs::create_dir_all(&node.data_dir) {
        return result(FormatOutcome::Failed(format!(
            "could not create data dir {}: {}",
            node.data_dir.display(),
            e
        )));
    }

    let cmd = config
        .oneshot_tool(node, STORAGE_TOOL)
        .arg("format")
        .arg("-t")
        .arg(id.as_str())
        .arg("-c")
        .arg(node.config_path.display().to_string());

    match runner.run(&cmd).await {
        Ok(output) if output.success() => {
            info!(node = %node.name, "Storage formatted");
            result(FormatOutcome::Formatted)
        }
        Ok(output) => {
            error!(node = %node.name, stderr = %output.error_text(), "Storage format failed");
            result(FormatOutcome::Failed(output.error_text().to_string()))
        }
        Err(e) => {
            error!(node = %node.name, error = %e, "Storage format could not run");
            result(FormatOutcome::Failed(e.to_string()))
        }
    }
}
