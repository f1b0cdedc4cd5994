//! Crate-level error types.
//!
//! # Error Handling Patterns
//!
//! The orchestrator uses two propagation policies based on operation shape:
//!
//! ## Fail-Fast (Propagate Errors)
//!
//! Used for cluster-wide operations where partial application would leave the
//! deployment in an ambiguous state:
//! - Identifier acquisition and persistence
//! - `docker compose up` / `down`
//! - Topic create/delete/alter
//!
//! ## Isolate and Aggregate (Per-Node)
//!
//! Used for operations that are naturally per-node, where one node's failure
//! must not abort the others:
//! - Storage formatting (see [`FormatReport`](crate::storage::FormatReport))
//! - Health probing (a node that cannot be probed is reported `Unhealthy`,
//!   not an error)
//!
//! Two conditions are deliberately *not* errors:
//! - A health-poll timeout returns the last observed snapshot; a slow-starting
//!   cluster is not necessarily broken and the caller decides what partial
//!   health means.
//! - A declined confirmation on a destructive action is a no-op outcome
//!   (see [`DeleteOutcome::Cancelled`](crate::topics::DeleteOutcome)).

use std::{io, result};
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Errors surfaced by the orchestration core.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Environment is not ready (docker unreachable, compose file missing,
    /// stale init lock). Fatal, no retry.
    #[error("Prerequisite not met: {0}")]
    Prerequisite(String),

    /// The persisted cluster identifier is unreadable or malformed. Fatal;
    /// requires manual intervention. The file is never overwritten, because
    /// formatting nodes with divergent identifiers breaks quorum
    /// irrecoverably.
    #[error("Cluster identifier file corrupt or unreadable: {0}")]
    Persistence(String),

    /// Storage formatting failed for one node. Isolated per node and
    /// aggregated; partial success is a valid terminal state.
    #[error("Storage format failed for node {node}: {message}")]
    StorageFormat { node: String, message: String },

    /// The process/container manager rejected or could not service a
    /// cluster-wide start/stop request.
    #[error("Supervisor error: {0}")]
    Supervisor(String),

    /// A topic spec failed local validation before any remote call was made.
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// The broker rejected a topic metadata operation. The broker's own
    /// message is passed through verbatim, never swallowed.
    #[error("Topic operation failed: {0}")]
    TopicOperation(String),

    /// The broker rejected a consumer-group query.
    #[error("Group operation failed: {0}")]
    GroupOperation(String),

    /// An external command could not be spawned or waited on. This is the
    /// runner-level failure (program missing, manager not installed), as
    /// opposed to a command that ran and reported an error of its own.
    #[error("Failed to run `{program}`: {message}")]
    CommandFailed { program: String, message: String },

    /// Filesystem error outside the identifier path (data dirs, lock files).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Suggested process exit code for this error.
    ///
    /// `0` is success, `1` a prerequisite/fatal failure, `2` a partial
    /// failure. Code `3` (user-cancelled destructive action) never appears
    /// here because a declined confirmation is an outcome, not an error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::StorageFormat { .. } => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_node_for_format_errors() {
        let err = Error::StorageFormat {
            node: "kafka-2".to_string(),
            message: "log directory not empty".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("kafka-2"));
        assert!(display.contains("log directory not empty"));
    }

    #[test]
    fn test_topic_operation_passes_broker_text_verbatim() {
        let broker_text = "Topic 'orders' already exists.";
        let err = Error::TopicOperation(broker_text.to_string());
        assert!(format!("{}", err).contains(broker_text));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Prerequisite("no docker".into()).exit_code(), 1);
        assert_eq!(Error::Persistence("bad id".into()).exit_code(), 1);
        assert_eq!(
            Error::StorageFormat {
                node: "kafka-1".into(),
                message: "boom".into()
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
