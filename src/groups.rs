//! Consumer-group inspection.
//!
//! Read-only pass-through to the broker's consumer-group tool. The broker
//! owns group membership and offsets; this layer only validates the group ID
//! and relays output.

use std::sync::Arc;

use crate::config::ClusterConfig;
use crate::constants::GROUPS_TOOL;
use crate::error::{Error, Result};
use crate::runner::CommandRunner;
use crate::validation::validate_group_id;

pub struct GroupInspector {
    config: Arc<ClusterConfig>,
    runner: Arc<dyn CommandRunner>,
}

impl GroupInspector {
    pub fn new(config: Arc<ClusterConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        GroupInspector { config, runner }
    }

    /// List all consumer group names.
    pub async fn list(&self) -> Result<Vec<String>> {
        let cmd = self.config.admin_tool(GROUPS_TOOL)?.arg("--list");
        let output = self.runner.run(&cmd).await?;
        if !output.success() {
            return Err(Error::GroupOperation(output.error_text().to_string()));
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Describe one group (members, partitions, lag) as the tool reports it.
    pub async fn describe(&self, group: &str) -> Result<String> {
        validate_group_id(group)?;
        let cmd = self
            .config
            .admin_tool(GROUPS_TOOL)?
            .args(["--describe", "--group", group]);
        let output = self.runner.run(&cmd).await?;
        if !output.success() {
            return Err(Error::GroupOperation(output.error_text().to_string()));
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, MockRunner};

    fn inspector() -> (GroupInspector, Arc<MockRunner>) {
        let mock = Arc::new(MockRunner::new());
        let inspector = GroupInspector::new(Arc::new(ClusterConfig::default()), mock.clone());
        (inspector, mock)
    }

    #[tokio::test]
    async fn test_list_groups() {
        let (inspector, mock) = inspector();
        mock.on("--list", CommandOutput::ok_with("billing\nanalytics\n"));
        let groups = inspector.list().await.unwrap();
        assert_eq!(groups, vec!["billing".to_string(), "analytics".to_string()]);
        assert_eq!(mock.calls_matching("kafka-consumer-groups.sh --bootstrap-server"), 1);
    }

    #[tokio::test]
    async fn test_describe_validates_group_id() {
        let (inspector, mock) = inspector();
        let err = inspector.describe("bad group").await.unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_describe_relays_tool_errors() {
        let (inspector, mock) = inspector();
        mock.on(
            "--describe",
            CommandOutput::err_with(1, "Error: Consumer group 'billing' does not exist."),
        );
        let err = inspector.describe("billing").await.unwrap_err();
        match err {
            Error::GroupOperation(msg) => assert!(msg.contains("does not exist")),
            other => panic!("expected GroupOperation, got {:?}", other),
        }
    }
}
