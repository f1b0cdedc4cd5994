//! Cross-cutting control flow for the lifecycle verbs.
//!
//! The orchestrator is the only component that composes the others. `init`
//! is an explicit state machine (`CheckingPrereqs → GeneratingIdentity →
//! FormattingStorage → Done`, any state able to fail), so partial outcomes
//! are representable and re-running is safe: identifier reuse
//! ([`ClusterIdentity`]) and the format marker guard
//! ([`StorageInitializer`]) together make `init` idempotent.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use backon::Retryable;
use serde_json::json;
use tracing::{info, warn};

use crate::config::ClusterConfig;
use crate::constants::{
    CONSOLE_CONSUMER_TOOL, CONSOLE_PRODUCER_TOOL, SMOKE_CONSUME_TIMEOUT_MS,
};
use crate::error::{Error, Result};
use crate::health::HealthMonitor;
use crate::identity::{ClusterIdentity, IdentitySource};
use crate::retry::{consume_policy, probe_policy};
use crate::runner::{CommandOutput, CommandRunner};
use crate::storage::{FormatReport, StorageInitializer};
use crate::supervisor::ProcessSupervisor;
use crate::topics::{TopicManager, TopicSpec};
use crate::types::{ClusterHealth, ClusterId};

/// Phases of the `init` state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    CheckingPrereqs,
    GeneratingIdentity,
    FormattingStorage,
    Done,
}

impl std::fmt::Display for InitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InitPhase::CheckingPrereqs => "checking-prereqs",
            InitPhase::GeneratingIdentity => "generating-identity",
            InitPhase::FormattingStorage => "formatting-storage",
            InitPhase::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// Everything `init` observed, including partial progress.
///
/// `phase` is the furthest phase reached; a failure pins it to the phase
/// that failed rather than discarding what earlier phases accomplished.
#[derive(Debug)]
pub struct InitOutcome {
    pub phase: InitPhase,
    pub identity: Option<(ClusterId, IdentitySource)>,
    pub report: Option<FormatReport>,
    pub failure: Option<Error>,
}

impl InitOutcome {
    pub fn is_success(&self) -> bool {
        self.phase == InitPhase::Done
    }

    /// Exit code per the command contract: 0 success, 1 fatal, 2 partial
    /// (some nodes formatted, some didn't).
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else if let Some(failure) = &self.failure {
            failure.exit_code()
        } else {
            2
        }
    }
}

/// `status` verb payload: the health snapshot plus the persisted identity,
/// if any.
#[derive(Debug)]
pub struct StatusReport {
    pub health: ClusterHealth,
    pub cluster_id: Option<ClusterId>,
}

/// Produce/consume round-trip result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeReport {
    pub topic: String,
    pub sent: u32,
    pub received: u32,
}

impl SmokeReport {
    pub fn is_success(&self) -> bool {
        self.sent == self.received
    }
}

/// Composes identity, storage, supervision, and health into the lifecycle
/// verbs.
pub struct Orchestrator {
    config: Arc<ClusterConfig>,
    runner: Arc<dyn CommandRunner>,
    identity: ClusterIdentity,
    storage: StorageInitializer,
    supervisor: ProcessSupervisor,
    health: Arc<HealthMonitor>,
}

impl Orchestrator {
    pub fn new(config: Arc<ClusterConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        Orchestrator {
            identity: ClusterIdentity::new(Arc::clone(&config)),
            storage: StorageInitializer::new(Arc::clone(&config), Arc::clone(&runner)),
            supervisor: ProcessSupervisor::new(Arc::clone(&config), Arc::clone(&runner)),
            health: Arc::new(HealthMonitor::new(Arc::clone(&config), Arc::clone(&runner))),
            config,
            runner,
        }
    }

    /// Shared handle for wiring interrupt handling to poll cancellation.
    pub fn health_monitor(&self) -> Arc<HealthMonitor> {
        Arc::clone(&self.health)
    }

    /// Initialize the cluster: check prerequisites, acquire the identifier,
    /// format every node's storage.
    ///
    /// Never panics and never half-reports: each phase's result lands in the
    /// returned [`InitOutcome`].
    pub async fn init(&self) -> InitOutcome {
        let mut outcome = InitOutcome {
            phase: InitPhase::CheckingPrereqs,
            identity: None,
            report: None,
            failure: None,
        };

        info!(phase = %outcome.phase, "init");
        if let Err(e) = self.check_prereqs().await {
            outcome.failure = Some(e);
            return outcome;
        }

        outcome.phase = InitPhase::GeneratingIdentity;
        info!(phase = %outcome.phase, "init");
        let (id, source) = match self.identity.ensure(self.runner.as_ref()).await {
            Ok(pair) => pair,
            Err(e) => {
                outcome.failure = Some(e);
                return outcome;
            }
        };
        outcome.identity = Some((id.clone(), source));

        outcome.phase = InitPhase::FormattingStorage;
        info!(phase = %outcome.phase, "init");
        let report = self.storage.format_all(&id).await;
        let all_ok = report.is_success();
        outcome.report = Some(report);

        if all_ok {
            outcome.phase = InitPhase::Done;
            info!(phase = %outcome.phase, cluster_id = %id, "init");
        }
        outcome
    }

    /// Start the cluster and wait (bounded) for it to become healthy.
    ///
    /// Returns the final snapshot even when the cluster is still degraded;
    /// the caller decides whether partial health is acceptable.
    pub async fn start(&self) -> Result<ClusterHealth> {
        self.supervisor.start_all().await?;
        Ok(self
            .health
            .poll_until_healthy(self.config.health_timeout, self.config.poll_interval)
            .await)
    }

    pub async fn stop(&self) -> Result<()> {
        self.supervisor.stop_all().await
    }

    pub async fn restart(&self) -> Result<ClusterHealth> {
        self.supervisor.restart().await?;
        Ok(self
            .health
            .poll_until_healthy(self.config.health_timeout, self.config.poll_interval)
            .await)
    }

    /// Single-shot status: health snapshot plus persisted identity.
    pub async fn status(&self) -> Result<StatusReport> {
        let health = self.health.status().await?;
        let cluster_id = match self.identity.load() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Could not read cluster identifier for status");
                None
            }
        };
        Ok(StatusReport { health, cluster_id })
    }

    /// Tail one node's logs (pass-through to the supervisor).
    pub async fn logs(&self, node: &str, lines: u32) -> Result<String> {
        self.supervisor.logs(node, lines).await
    }

    /// Partition-invariant check (pass-through to the health monitor).
    pub async fn check_invariants(&self) -> Result<crate::health::InvariantReport> {
        self.health.check_invariants().await
    }

    /// Produce/consume round trip against a throwaway topic.
    ///
    /// Creates `test-<epoch>`, produces `messages` JSON records through the
    /// console producer, and reads them back with a fresh consumer group.
    pub async fn smoke_test(&self, messages: u32) -> Result<SmokeReport> {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let topic = format!("test-{}", epoch);
        let group = format!("test-group-{}", epoch);

        let topics = TopicManager::new(Arc::clone(&self.config), Arc::clone(&self.runner));
        topics
            .create(&TopicSpec::new(
                topic.clone(),
                3,
                self.config.nodes.len() as u32,
            ))
            .await?;

        let payload: String = (0..messages)
            .map(|i| {
                let record = json!({
                    "id": i,
                    "timestamp_ms": epoch * 1000,
                    "message": format!("Test message {}", i),
                });
                format!("{}\n", record)
            })
            .collect();

        let produce = self
            .config
            .admin_tool(CONSOLE_PRODUCER_TOOL)?
            .arg("--topic")
            .arg(topic.as_str())
            .stdin(payload);
        let output = self.runner.run(&produce).await?;
        if !output.success() {
            return Err(Error::TopicOperation(output.error_text().to_string()));
        }
        info!(topic = %topic, sent = messages, "Produced smoke-test messages");

        // Freshly produced messages can take a moment to become visible to a
        // brand-new group; retry a consume that returned nothing.
        let consume = self
            .config
            .admin_tool(CONSOLE_CONSUMER_TOOL)?
            .arg("--topic")
            .arg(topic.as_str())
            .arg("--group")
            .arg(group.as_str())
            .arg("--from-beginning")
            .arg("--max-messages")
            .arg(messages.to_string())
            .arg("--timeout-ms")
            .arg(SMOKE_CONSUME_TIMEOUT_MS.to_string());

        let output = (|| async {
            let output = self.runner.run(&consume).await?;
            if !output.success() && output.stdout.trim().is_empty() {
                return Err(Error::TopicOperation(output.error_text().to_string()));
            }
            Ok::<CommandOutput, Error>(output)
        })
        .retry(consume_policy())
        .when(|e| !matches!(e, Error::CommandFailed { .. }))
        .await?;

        let received = output
            .stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count() as u32;

        let report = SmokeReport {
            topic,
            sent: messages,
            received,
        };
        info!(
            topic = %report.topic,
            sent = report.sent,
            received = report.received,
            "Smoke test finished"
        );
        Ok(report)
    }

    /// Environment checks that must pass before anything else runs: the
    /// compose file exists and the docker daemon answers.
    async fn check_prereqs(&self) -> Result<()> {
        if !self.config.compose_file.exists() {
            return Err(Error::Prerequisite(format!(
                "compose file {} not found",
                self.config.compose_file.display()
            )));
        }

        let probe = crate::runner::CommandSpec::new("docker").arg("info");
        let output = (|| async { self.runner.run(&probe).await })
            .retry(probe_policy())
            .when(|e| matches!(e, Error::CommandFailed { .. }))
            .await
            .map_err(|e| Error::Prerequisite(format!("docker not available: {}", e)))?;
        if !output.success() {
            return Err(Error::Prerequisite(format!(
                "docker daemon not reachable: {}",
                output.error_text()
            )));
        }
        Ok(())
    }
}
