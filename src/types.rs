//! Typed cluster-state model.
//!
//! These types replace the stringly-typed state the underlying tools deal in
//! with wrappers that cannot be mixed up: a [`ClusterId`] is not a topic
//! name, a [`NodeId`] is not a port. Node and cluster states are *derived*
//! values, recomputed on every query and never persisted; the only durable
//! state in the whole system is the identifier file owned by
//! [`ClusterIdentity`](crate::identity::ClusterIdentity).

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Maximum accepted length for a cluster identifier.
///
/// Kafka's own identifiers are 22-character base64url UUIDs; the cap is
/// deliberately looser so the orchestrator is not bound to one tool's
/// format, while still rejecting obviously corrupt file content.
pub const MAX_CLUSTER_ID_LENGTH: usize = 64;

/// An opaque cluster identifier shared by every node of one cluster
/// instance.
///
/// Generated once (delegated to the broker's ID-generation utility),
/// persisted durably, and immutable thereafter. All nodes must format
/// storage with the identical identifier; two nodes formatted with
/// different identifiers can never form a quorum again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterId(String);

impl ClusterId {
    /// Parse an identifier, rejecting malformed content.
    ///
    /// Accepts non-empty ASCII alphanumeric strings (plus `-` and `_`) of at
    /// most [`MAX_CLUSTER_ID_LENGTH`] characters. Everything else is treated
    /// as corruption, not as a value to silently repair.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Persistence("identifier is empty".to_string()));
        }
        if trimmed.len() > MAX_CLUSTER_ID_LENGTH {
            return Err(Error::Persistence(format!(
                "identifier is too long ({} chars, max {})",
                trimmed.len(),
                MAX_CLUSTER_ID_LENGTH
            )));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(Error::Persistence(format!(
                "identifier contains invalid character {:?}",
                bad
            )));
        }
        Ok(ClusterId(trimmed.to_string()))
    }

    /// The raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A broker's position in the static node set (1-based, matching the
/// compose service suffix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub const fn new(value: u32) -> Self {
        NodeId(value)
    }

    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static description of one broker.
///
/// The node set is read-mostly configuration: loaded once at startup and
/// treated as immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: NodeId,
    /// Compose service name, e.g. `kafka-1`.
    pub name: String,
    /// Host-facing `host:port` clients connect to.
    pub address: String,
    /// Host side of the broker's data bind mount. The format marker file
    /// appears here once the node's storage has been formatted.
    pub data_dir: PathBuf,
    /// In-container path of the broker's server properties file.
    pub config_path: PathBuf,
}

/// Derived per-node lifecycle state. Never persisted.
///
/// Lifecycle: `Unformatted → Formatted` (storage initializer, once per data
/// directory), `Formatted → Starting → {Healthy | Unhealthy}` (supervisor +
/// health monitor), and any state `→ Stopped` on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// No formatted storage exists for this node yet.
    Unformatted,
    /// Storage is formatted but the node's container has never been created.
    Formatted,
    /// Container is running but the broker has not passed its health check.
    Starting,
    /// Container is running and reports healthy.
    Healthy,
    /// Container is running but reports unhealthy.
    Unhealthy,
    /// Container exists but is not running.
    Stopped,
}

impl NodeState {
    #[inline]
    pub fn is_healthy(self) -> bool {
        matches!(self, NodeState::Healthy)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Unformatted => "unformatted",
            NodeState::Formatted => "formatted",
            NodeState::Starting => "starting",
            NodeState::Healthy => "healthy",
            NodeState::Unhealthy => "unhealthy",
            NodeState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Aggregate cluster state, recomputed from node states on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    /// Every node is healthy.
    Healthy,
    /// A strict minority of nodes is not healthy; quorum-bearing metadata
    /// operations remain viable.
    Degraded,
    /// Half or more of the nodes are not healthy (or there are no nodes).
    Down,
}

impl ClusterState {
    /// Aggregate node states per the threshold rule.
    ///
    /// `Healthy` iff all nodes are healthy; `Degraded` iff the unhealthy
    /// set is a strict minority (a majority remains, so the metadata quorum
    /// is still viable); `Down` otherwise. An empty node set is `Down`.
    pub fn aggregate(states: &[NodeState]) -> Self {
        if states.is_empty() {
            return ClusterState::Down;
        }
        let healthy = states.iter().filter(|s| s.is_healthy()).count();
        if healthy == states.len() {
            ClusterState::Healthy
        } else if healthy * 2 > states.len() {
            ClusterState::Degraded
        } else {
            ClusterState::Down
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClusterState::Healthy => "healthy",
            ClusterState::Degraded => "degraded",
            ClusterState::Down => "down",
        };
        write!(f, "{}", s)
    }
}

/// One node's observed state in a health snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHealth {
    pub id: NodeId,
    pub name: String,
    pub state: NodeState,
}

/// A short-lived point-in-time snapshot of cluster health.
///
/// Owned by the health monitor's query path; callers receive it by value and
/// must not treat it as a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHealth {
    pub nodes: Vec<NodeHealth>,
    pub state: ClusterState,
}

impl ClusterHealth {
    /// Build a snapshot, computing the aggregate from the node states.
    pub fn from_nodes(nodes: Vec<NodeHealth>) -> Self {
        let states: Vec<NodeState> = nodes.iter().map(|n| n.state).collect();
        let state = ClusterState::aggregate(&states);
        ClusterHealth { nodes, state }
    }

    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.state == ClusterState::Healthy
    }
}
