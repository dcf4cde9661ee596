//! Engine adapters.
//!
//! An adapter wraps one external scanning engine: it knows where the binaries
//! live, how to invoke them, and how to read their output. The orchestrator
//! only ever talks to the [`EngineAdapter`] trait, so engines backed by
//! something other than a local CLI can be plugged in the same way.

mod cli;

pub use cli::{CliEngine, EngineProfile, FILE_PLACEHOLDER};

use async_trait::async_trait;
use malscan_core::{EngineDescriptor, EngineError, EngineStatus, UpdateOutcome, Verdict};
use std::path::Path;

/// One scanning engine.
///
/// `scan` is infallible by signature: every failure of the engine itself is
/// reported inside the returned [`Verdict`].
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Static metadata for this engine
    fn descriptor(&self) -> &EngineDescriptor;

    /// Unique engine name (report key)
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Whether the engine can run on this host right now.
    ///
    /// Side-effect free; may be called any number of times.
    fn is_installed(&self) -> bool;

    /// Query the engine version.
    async fn version(&self) -> Result<String, EngineError>;

    /// Ask the updater whether newer definitions exist.
    async fn is_update_available(&self) -> Result<bool, EngineError>;

    /// Fetch new definitions if any are available.
    async fn update_definitions(&self) -> Result<UpdateOutcome, EngineError>;

    /// Scan the staged file at `artifact`.
    async fn scan(&self, artifact: &Path) -> Verdict;

    /// Installation state plus version, for listings.
    async fn status(&self) -> EngineStatus {
        let installed = self.is_installed();
        let (version, version_error) = if installed {
            match self.version().await {
                Ok(v) => (Some(v), None),
                Err(e) => (None, Some(e.to_string())),
            }
        } else {
            (None, None)
        };

        EngineStatus {
            descriptor: self.descriptor().clone(),
            installed,
            version,
            version_error,
        }
    }
}

/// True if `path` is a regular file the current user may execute.
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && has_exec_bit(&m))
}

#[cfg(unix)]
fn has_exec_bit(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
const fn has_exec_bit(_metadata: &std::fs::Metadata) -> bool {
    true
}
