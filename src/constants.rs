//! Centralized deployment and timing constants.
//!
//! This module consolidates the magic numbers used throughout the
//! orchestrator. Having them in one place makes it easier to:
//!
//! - Understand the deployment layout the defaults describe
//! - Update values consistently
//! - Document the rationale for each constant
//!
//! # Categories
//!
//! - **Deployment Constants**: the default 3-broker compose layout
//! - **Timing Constants**: health polling, settling, and log-tail defaults
//! - **Tool Constants**: paths to the broker's bundled admin CLI

// =============================================================================
// Deployment Constants
// =============================================================================

/// Number of brokers in the default deployment.
///
/// Three nodes is the smallest cluster that can lose one node and still hold
/// a metadata quorum (2 of 3).
pub const DEFAULT_NODE_COUNT: u32 = 3;

/// Compose service name prefix; nodes are named `kafka-1`, `kafka-2`, ...
pub const SERVICE_PREFIX: &str = "kafka";

/// Host-facing port of the first broker. Subsequent brokers add
/// [`PORT_STRIDE`]: 9092, 9192, 9292.
pub const DEFAULT_BASE_PORT: u16 = 9092;

/// Port distance between consecutive brokers' host listeners.
pub const PORT_STRIDE: u16 = 100;

/// In-container client port shared by all brokers (each broker resolves its
/// peers by compose service name, so the port does not need to vary).
pub const INTERNAL_CLIENT_PORT: u16 = 9092;

/// Default compose file describing the cluster.
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Default path of the persisted cluster identifier file.
pub const DEFAULT_CLUSTER_ID_FILE: &str = "cluster.id";

/// Default root under which each node's data directory lives
/// (`<root>/kafka-1`, ...). These are the host sides of the bind mounts the
/// compose file gives each broker.
pub const DEFAULT_DATA_ROOT: &str = "data";

/// In-container path of each broker's server properties file, passed to the
/// storage format tool.
pub const DEFAULT_SERVER_CONFIG: &str = "/opt/kafka/config/kraft/server.properties";

/// Marker file the storage format tool writes into a formatted log
/// directory. Its presence is the idempotence guard: a directory containing
/// it is never re-formatted.
pub const FORMAT_MARKER_FILE: &str = "meta.properties";

// =============================================================================
// Tool Constants
// =============================================================================

/// In-container directory holding the broker's bundled CLI tools.
pub const KAFKA_BIN_DIR: &str = "/opt/kafka/bin";

pub const STORAGE_TOOL: &str = "kafka-storage.sh";
pub const TOPICS_TOOL: &str = "kafka-topics.sh";
pub const CONFIGS_TOOL: &str = "kafka-configs.sh";
pub const GROUPS_TOOL: &str = "kafka-consumer-groups.sh";
pub const CONSOLE_PRODUCER_TOOL: &str = "kafka-console-producer.sh";
pub const CONSOLE_CONSUMER_TOOL: &str = "kafka-console-consumer.sh";

// =============================================================================
// Timing Constants
// =============================================================================

/// Default overall budget for waiting on cluster health after `start`.
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 60;

/// Default interval between health polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Mandatory settling delay between `stop` and `start` during a restart.
///
/// The broker's graceful-shutdown/rejoin protocol needs wall-clock time and
/// is not observable synchronously from this layer.
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 5;

/// Default number of log lines returned by the `logs` verb.
pub const DEFAULT_LOG_TAIL_LINES: u32 = 100;

/// How long the console consumer waits for messages during a smoke test
/// before giving up, in milliseconds.
pub const SMOKE_CONSUME_TIMEOUT_MS: u64 = 10_000;

/// Default number of messages produced by the smoke test.
pub const DEFAULT_SMOKE_MESSAGES: u32 = 3;
