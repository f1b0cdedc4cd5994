//! Cluster-wide process supervision.
//!
//! Start/stop are all-or-nothing requests against the container manager; the
//! supervisor fails fast when the manager is unreachable or the compose file
//! is missing, and it deliberately does *not* confirm health. That is the
//! health monitor's job; `start_all` returns once the start request is
//! accepted.

use std::sync::Arc;

use tracing::info;

use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::runner::{CommandRunner, CommandSpec};

/// Starts and stops the broker set as a unit via the container manager.
pub struct ProcessSupervisor {
    config: Arc<ClusterConfig>,
    runner: Arc<dyn CommandRunner>,
}

impl ProcessSupervisor {
    pub fn new(config: Arc<ClusterConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        ProcessSupervisor { config, runner }
    }

    /// Request cluster-wide start. Returns once the request is accepted.
    pub async fn start_all(&self) -> Result<()> {
        self.check_compose_file()?;
        info!(compose_file = %self.config.compose_file.display(), "Starting cluster");
        self.run_compose(self.config.compose().args(["up", "-d"]))
            .await?;
        Ok(())
    }

    /// Request cluster-wide stop.
    pub async fn stop_all(&self) -> Result<()> {
        self.check_compose_file()?;
        info!("Stopping cluster");
        self.run_compose(self.config.compose().arg("down")).await?;
        Ok(())
    }

    /// Stop, wait out the settling delay, start.
    ///
    /// The delay exists because the broker's graceful-shutdown/rejoin
    /// protocol needs wall-clock time and is not observable synchronously
    /// from this layer.
    pub async fn restart(&self) -> Result<()> {
        self.stop_all().await?;
        info!(
            settle_secs = self.config.settle_delay.as_secs(),
            "Waiting for brokers to settle before restart"
        );
        tokio::time::sleep(self.config.settle_delay).await;
        self.start_all().await
    }

    /// Tail one node's logs.
    pub async fn logs(&self, node: &str, lines: u32) -> Result<String> {
        let node = self.config.node(node).ok_or_else(|| {
            Error::InvalidSpec(format!(
                "unknown node '{}' (known: {})",
                node,
                self.config
                    .nodes
                    .iter()
                    .map(|n| n.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;
        let output = self
            .run_compose(
                self.config
                    .compose()
                    .args(["logs", "--tail"])
                    .arg(lines.to_string())
                    .arg(node.name.as_str()),
            )
            .await?;
        Ok(output)
    }

    fn check_compose_file(&self) -> Result<()> {
        if !self.config.compose_file.exists() {
            return Err(Error::Supervisor(format!(
                "compose file {} not found",
                self.config.compose_file.display()
            )));
        }
        Ok(())
    }

    async fn run_compose(&self, cmd: CommandSpec) -> Result<String> {
        let output = self
            .runner
            .run(&cmd)
            .await
            .map_err(|e| Error::Supervisor(e.to_string()))?;
        if !output.success() {
            return Err(Error::Supervisor(output.error_text().to_string()));
        }
        Ok(output.stdout)
    }
}
