//! Topic metadata management.
//!
//! Create/describe/alter/delete/list against the running cluster, delegated
//! to the broker's own topic tool. Local validation covers only what can be
//! decided without the broker (partition/replication lower bounds, name
//! rules); everything else, such as replication factor vs. live brokers and
//! configuration key names, is the broker's authority and its error text is
//! surfaced verbatim.
//!
//! Deletion is gated on an explicit [`Confirmation`] capability. The core
//! never prompts; the CLI layer is responsible for sourcing the confirmation
//! from a human, which keeps the destructive path testable headlessly.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::config::ClusterConfig;
use crate::constants::{CONFIGS_TOOL, TOPICS_TOOL};
use crate::error::{Error, Result};
use crate::runner::CommandRunner;
use crate::validation::validate_topic_name;

/// Desired shape of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u32,
    pub config: BTreeMap<String, String>,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: u32, replication_factor: u32) -> Self {
        TopicSpec {
            name: name.into(),
            partitions,
            replication_factor,
            config: BTreeMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Local validation, run before any remote call.
    pub fn validate(&self) -> Result<()> {
        validate_topic_name(&self.name)?;
        if self.partitions < 1 {
            return Err(Error::InvalidSpec(format!(
                "topic '{}' needs at least 1 partition",
                self.name
            )));
        }
        if self.replication_factor < 1 {
            return Err(Error::InvalidSpec(format!(
                "topic '{}' needs a replication factor of at least 1",
                self.name
            )));
        }
        Ok(())
    }
}

/// Capability token for destructive operations.
///
/// Obtained by the CLI from an interactive prompt (or `--yes`); tests
/// construct it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// Outcome of a delete request. Declining the confirmation is a no-op, not
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

/// Parsed summary of one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescription {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u32,
    /// Full tool output, for display.
    pub raw: String,
}

fn parse_describe(name: &str, stdout: &str) -> Result<TopicDescription> {
    // Header line shape:
    // Topic: orders  TopicId: ...  PartitionCount: 6  ReplicationFactor: 3  Configs: ...
    for line in stdout.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let find = |key: &str| {
            tokens
                .iter()
                .position(|t| *t == key)
                .and_then(|i| tokens.get(i + 1))
                .and_then(|v| v.parse::<u32>().ok())
        };
        if let (Some(partitions), Some(replication_factor)) =
            (find("PartitionCount:"), find("ReplicationFactor:"))
        {
            return Ok(TopicDescription {
                name: name.to_string(),
                partitions,
                replication_factor,
                raw: stdout.to_string(),
            });
        }
    }
    Err(Error::TopicOperation(format!(
        "could not parse describe output for topic '{}': {}",
        name,
        stdout.trim()
    )))
}

/// Topic lifecycle operations against the running cluster.
pub struct TopicManager {
    config: Arc<ClusterConfig>,
    runner: Arc<dyn CommandRunner>,
}

impl TopicManager {
    pub fn new(config: Arc<ClusterConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        TopicManager { config, runner }
    }

    /// Create a topic. Fails with [`Error::InvalidSpec`] before issuing the
    /// remote call if the spec is locally invalid.
    pub async fn create(&self, spec: &TopicSpec) -> Result<()> {
        spec.validate()?;

        let mut cmd = self
            .config
            .admin_tool(TOPICS_TOOL)?
            .args(["--create", "--topic"])
            .arg(spec.name.as_str())
            .arg("--partitions")
            .arg(spec.partitions.to_string())
            .arg("--replication-factor")
            .arg(spec.replication_factor.to_string());
        for (key, value) in &spec.config {
            cmd = cmd.arg("--config").arg(format!("{}={}", key, value));
        }

        let output = self.runner.run(&cmd).await?;
        if !output.success() {
            return Err(Error::TopicOperation(output.error_text().to_string()));
        }
        info!(
            topic = %spec.name,
            partitions = spec.partitions,
            replication_factor = spec.replication_factor,
            "Topic created"
        );
        Ok(())
    }

    /// Delete a topic iff the caller supplies an affirmative confirmation.
    pub async fn delete(&self, name: &str, confirmation: Confirmation) -> Result<DeleteOutcome> {
        validate_topic_name(name)?;

        if confirmation == Confirmation::Declined {
            info!(topic = %name, "Deletion not confirmed, leaving topic untouched");
            return Ok(DeleteOutcome::Cancelled);
        }

        let cmd = self
            .config
            .admin_tool(TOPICS_TOOL)?
            .args(["--delete", "--topic", name]);
        let output = self.runner.run(&cmd).await?;
        if !output.success() {
            return Err(Error::TopicOperation(output.error_text().to_string()));
        }
        info!(topic = %name, "Topic deleted");
        Ok(DeleteOutcome::Deleted)
    }

    /// Change a single topic configuration entry.
    ///
    /// The key is not validated locally; the broker is the sole authority on
    /// valid configuration keys.
    pub async fn alter(&self, name: &str, key: &str, value: &str) -> Result<()> {
        validate_topic_name(name)?;

        let cmd = self
            .config
            .admin_tool(CONFIGS_TOOL)?
            .args(["--alter", "--entity-type", "topics", "--entity-name", name])
            .arg("--add-config")
            .arg(format!("{}={}", key, value));
        let output = self.runner.run(&cmd).await?;
        if !output.success() {
            return Err(Error::TopicOperation(output.error_text().to_string()));
        }
        info!(topic = %name, config_key = %key, "Topic configuration altered");
        Ok(())
    }

    /// Describe one topic, parsing its partition count and replication
    /// factor out of the tool output.
    pub async fn describe(&self, name: &str) -> Result<TopicDescription> {
        validate_topic_name(name)?;

        let cmd = self
            .config
            .admin_tool(TOPICS_TOOL)?
            .args(["--describe", "--topic", name]);
        let output = self.runner.run(&cmd).await?;
        if !output.success() {
            return Err(Error::TopicOperation(output.error_text().to_string()));
        }
        parse_describe(name, &output.stdout)
    }

    /// List all topic names.
    pub async fn list(&self) -> Result<Vec<String>> {
        let cmd = self.config.admin_tool(TOPICS_TOOL)?.arg("--list");
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
