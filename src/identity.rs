//! Cluster identifier acquisition and persistence.
//!
//! The identifier file is the only durable state this tool owns, and the
//! single most safety-critical piece of the bootstrap: every node must
//! format storage with the identical identifier, and formatting nodes with
//! divergent identifiers breaks cluster quorum irrecoverably. The contract
//! is therefore acquire-or-create:
//!
//! - an existing well-formed identifier is always reused, never regenerated
//! - an existing but unreadable/malformed file is a hard
//!   [`Persistence`](crate::error::Error::Persistence) failure; the file is
//!   never silently overwritten
//! - a fresh identifier is requested from the broker's own ID-generation
//!   utility and persisted atomically (write-temp-then-rename), so a crash
//!   can never leave a partial identifier behind
//!
//! Concurrent `init` invocations are serialized with an advisory lock file
//! next to the identifier file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ClusterConfig;
use crate::constants::STORAGE_TOOL;
use crate::error::{Error, Result};
use crate::runner::CommandRunner;
use crate::types::ClusterId;

/// Whether [`ClusterIdentity::ensure`] found or created the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// A persisted identifier existed and was returned unchanged.
    Reused,
    /// No identifier existed; a new one was generated and persisted.
    Generated,
}

impl std::fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentitySource::Reused => write!(f, "reused"),
            IdentitySource::Generated => write!(f, "generated"),
        }
    }
}

/// Owns the persisted cluster identifier.
pub struct ClusterIdentity {
    config: Arc<ClusterConfig>,
}

impl ClusterIdentity {
    pub fn new(config: Arc<ClusterConfig>) -> Self {
        ClusterIdentity { config }
    }

    fn path(&self) -> &Path {
        &self.config.cluster_id_file
    }

    fn lock_path(&self) -> PathBuf {
        let mut path = self.path().as_os_str().to_owned();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Return the persisted identifier, or generate, persist, and return a
    /// new one.
    pub async fn ensure(&self, runner: &dyn CommandRunner) -> Result<(ClusterId, IdentitySource)> {
        if let Some(id) = self.load()? {
            info!(cluster_id = %id, path = %self.path().display(), "Reusing existing cluster identifier");
            return Ok((id, IdentitySource::Reused));
        }

        let _lock = InitLock::acquire(self.lock_path())?;

        // Another invocation may have won the race between our existence
        // check and the lock.
        if let Some(id) = self.load()? {
            info!(cluster_id = %id, "Reusing cluster identifier written by concurrent invocation");
            return Ok((id, IdentitySource::Reused));
        }

        let id = self.generate(runner).await?;
        self.persist_atomic(&id)?;
        info!(cluster_id = %id, path = %self.path().display(), "Generated and persisted new cluster identifier");
        Ok((id, IdentitySource::Generated))
    }

    /// Read the persisted identifier if the file exists.
    ///
    /// A file that exists but cannot be read or does not hold a well-formed
    /// identifier is a [`Error::Persistence`] failure, not a cue to
    /// regenerate.
    pub fn load(&self) -> Result<Option<ClusterId>> {
        match fs::read_to_string(self.path()) {
            Ok(raw) => {
                let id = ClusterId::parse(&raw).map_err(|e| match e {
                    Error::Persistence(msg) => {
                        Error::Persistence(format!("{}: {}", self.path().display(), msg))
                    }
                    other => other,
                })?;
                Ok(Some(id))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Persistence(format!(
                "{}: {}",
                self.path().display(),
                e
            ))),
        }
    }

    /// Ask the broker's ID-generation utility for a fresh identifier.
    async fn generate(&self, runner: &dyn CommandRunner) -> Result<ClusterId> {
        let node = self.config.nodes.first().ok_or_else(|| {
            Error::Prerequisite("cannot generate an identifier with an empty node set".to_string())
        })?;
        let cmd = self.config.oneshot_tool(node, STORAGE_TOOL).arg("random-uuid");
        let output = runner.run(&cmd).await?;
        if !output.success() {
            return Err(Error::Prerequisite(format!(
                "identifier generation failed: {}",
                output.error_text()
            )));
        }
        // The tool prints the identifier on its own line; other lines (JVM
        // warnings etc.) may precede it.
        let raw = output
            .stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");
        ClusterId::parse(raw).map_err(|_| {
            Error::Prerequisite(format!(
                "identifier generation produced unusable output: {:?}",
                output.stdout.trim()
            ))
        })
    }

    /// Persist the identifier atomically: write a sibling temp file, sync,
    /// rename over the final path.
    fn persist_atomic(&self, id: &ClusterId) -> Result<()> {
        if let Some(parent) = self.path().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp_path = self.path().as_os_str().to_owned();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(id.as_str().as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, self.path())?;
        Ok(())
    }
}

/// Advisory lock file guarding identifier creation.
///
/// Created with `create_new` so exactly one invocation can hold it; removed
/// on drop. A lock left behind by a crashed invocation is surfaced as a
/// prerequisite failure naming the file, since deciding staleness needs an
/// operator.
struct InitLock {
    path: PathBuf,
}

impl InitLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(InitLock { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::Prerequisite(format!(
                    "another init appears to be in progress (lock file {} exists); \
                     remove it if no other invocation is running",
                    path.display()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for InitLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove init lock file");
        }
    }
}
