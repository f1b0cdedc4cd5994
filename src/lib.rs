//! # Krafter
//! Bootstrap-and-health orchestrator for a KRaft-mode Kafka cluster.
//!
//! Krafter drives an externally built multi-broker cluster through the
//! container manager (`docker compose`) and the broker's own admin CLI. It
//! replaces shell glue with a typed core: idempotent multi-node storage
//! initialization, coordinated startup with health-gated readiness, and a
//! cluster-state model that is recomputed on every query.
//!
//! # Goals
//! - One shared cluster identifier, acquired once and never regenerated
//! - Storage formatting that is safe to re-run (never silently re-formats)
//! - Bounded, cancellable health polling instead of sleep loops
//! - Every external effect behind one testable command seam
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use krafter::config::ClusterConfig;
//! use krafter::orchestrator::Orchestrator;
//! use krafter::runner::ProcessRunner;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Arc::new(ClusterConfig::from_env().unwrap());
//!     let orchestrator = Orchestrator::new(config, Arc::new(ProcessRunner::new()));
//!
//!     let outcome = orchestrator.init().await;
//!     if outcome.is_success() {
//!         let health = orchestrator.start().await.unwrap();
//!         println!("cluster is {}", health.state);
//!     }
//! }
//! ```
//!
//! The broker itself, the container runtime, and message
//! production/consumption are external collaborators: krafter calls them,
//! it does not reimplement them.

#![forbid(unsafe_code)]

pub mod config;
pub mod constants;
pub mod error;
pub mod groups;
pub mod health;
pub mod identity;
pub mod orchestrator;
pub mod retry;
pub mod runner;
pub mod storage;
pub mod supervisor;
pub mod telemetry;
pub mod topics;
pub mod types;
pub mod validation;

pub mod prelude {
    //! Re-exports of the types most callers need.
    pub use crate::config::ClusterConfig;
    pub use crate::error::{Error, Result};
    pub use crate::orchestrator::{InitOutcome, InitPhase, Orchestrator};
    pub use crate::runner::{CommandRunner, MockRunner, ProcessRunner};
    pub use crate::topics::{Confirmation, DeleteOutcome, TopicManager, TopicSpec};
    pub use crate::types::{ClusterHealth, ClusterId, ClusterState, NodeId, NodeSpec, NodeState};
}
