//! Integration tests for cluster identifier acquisition.
//!
//! These exercise the two safety-critical properties: `ensure()` is
//! idempotent (one generation, ever), and a malformed identifier file is
//! refused rather than overwritten.

use std::fs;
use std::sync::Arc;

use krafter::config::ClusterConfig;
use krafter::error::Error;
use krafter::identity::{ClusterIdentity, IdentitySource};
use krafter::runner::{CommandOutput, MockRunner};

fn config_in(dir: &std::path::Path) -> Arc<ClusterConfig> {
    let mut config = ClusterConfig::default();
    config.cluster_id_file = dir.join("cluster.id");
    config.data_root = dir.join("data");
    Arc::new(config)
}

fn uuid_runner(uuid: &str) -> MockRunner {
    let runner = MockRunner::new();
    runner.on("random-uuid", CommandOutput::ok_with(format!("{}\n", uuid)));
    runner
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_ensure_twice_returns_identical_id_without_second_write() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let identity = ClusterIdentity::new(config.clone());
    let runner = uuid_runner("q1Zmd7XnQJSURnXp_gBTjg");

    let (first, first_source) = identity.ensure(&runner).await.unwrap();
    assert_eq!(first_source, IdentitySource::Generated);

    let persisted_after_first = fs::read_to_string(&config.cluster_id_file).unwrap();

    let (second, second_source) = identity.ensure(&runner).await.unwrap();
    assert_eq!(second_source, IdentitySource::Reused);
    assert_eq!(first, second);

    // No second generation call, and the file is byte-identical.
    assert_eq!(runner.calls_matching("random-uuid"), 1);
    let persisted_after_second = fs::read_to_string(&config.cluster_id_file).unwrap();
    assert_eq!(persisted_after_first, persisted_after_second);
}

#[tokio::test]
async fn test_identifier_written_by_hand_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    fs::write(&config.cluster_id_file, "MkU3OEVhNTcwNTJENDM2Qk\n").unwrap();

    let identity = ClusterIdentity::new(config);
    let runner = uuid_runner("should-never-be-used-1");
    let (id, source) = identity.ensure(&runner).await.unwrap();

    assert_eq!(source, IdentitySource::Reused);
    assert_eq!(id.as_str(), "MkU3OEVhNTcwNTJENDM2Qk");
    assert_eq!(runner.calls_matching("random-uuid"), 0);
}

// ============================================================================
// Safety on corruption
// ============================================================================

#[tokio::test]
async fn test_malformed_identifier_fails_and_file_survives() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let original = "definitely not/a valid\nidentifier";
    fs::write(&config.cluster_id_file, original).unwrap();

    let identity = ClusterIdentity::new(config.clone());
    let err = identity
        .ensure(&uuid_runner("q1Zmd7XnQJSURnXp_gBTjg"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Persistence(_)));
    assert_eq!(fs::read_to_string(&config.cluster_id_file).unwrap(), original);
}

#[tokio::test]
async fn test_empty_identifier_file_is_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    fs::write(&config.cluster_id_file, "\n").unwrap();

    let identity = ClusterIdentity::new(config);
    let err = identity
        .ensure(&uuid_runner("q1Zmd7XnQJSURnXp_gBTjg"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Persistence(_)));
}

// ============================================================================
// Error message quality
// ============================================================================

#[tokio::test]
async fn test_persistence_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    fs::write(&config.cluster_id_file, "bad id!").unwrap();

    let identity = ClusterIdentity::new(config.clone());
    let err = identity
        .ensure(&uuid_runner("q1Zmd7XnQJSURnXp_gBTjg"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cluster.id"));
}
