//! Named retry policies for the few places transient failure is expected.
//!
//! Health polling is *not* retried through these policies; its bounded loop
//! with a fixed interval is contractual. These policies cover calls where
//! the external tool itself is flaky for a moment:
//!
//! | Policy | Min Delay | Max Delay | Retries | Use Case |
//! |--------|-----------|-----------|---------|----------|
//! | `probe_policy` | 200ms | 2s | 3 | `docker info` prerequisite probe |
//! | `consume_policy` | 500ms | 5s | 4 | smoke-test consumer catching up |
//!
//! All policies include jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Policy for the docker daemon prerequisite probe.
///
/// The daemon occasionally refuses connections for a beat while busy;
/// three quick retries distinguish "busy" from "absent".
pub fn probe_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(3)
        .with_jitter()
}

/// Policy for the smoke-test consumer.
///
/// Freshly produced messages can take a moment to become visible to a new
/// consumer group; retrying the whole consume keeps the smoke test from
/// flaking on timing.
pub fn consume_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(4)
        .with_jitter()
}
