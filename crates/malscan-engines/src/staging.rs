//! Transient on-disk materialization of artifacts.
//!
//! Engine binaries only read real filesystem paths, so every scan request
//! writes the artifact to a uniquely named file first. The file is owned by a
//! [`StagedFile`] handle and removed when that handle is released or dropped,
//! which covers normal completion, adapter errors, panics unwinding through
//! the orchestrator, and cancellation of the request future.

use malscan_core::{Result, ScanError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

use crate::artifact::Artifact;

const STAGE_PREFIX: &str = "malscan_";
const STAGE_SUFFIX: &str = ".data";

/// Writes artifacts to transient files.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStaging {
    dir: Option<PathBuf>,
}

impl ArtifactStaging {
    /// Stage into `dir`, or into the system temp directory when `None`.
    #[must_use]
    pub const fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Directory staged files are created in, if overridden
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Write `artifact` to a fresh read-only file.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Staging` if the file cannot be created or written
    /// (missing directory, disk full, permissions).
    pub async fn stage(&self, artifact: &Artifact) -> Result<StagedFile> {
        let dir = self.dir.clone();
        let bytes = artifact.shared_bytes();

        let staged = tokio::task::spawn_blocking(move || write_staged(dir.as_deref(), &bytes))
            .await
            .map_err(|e| ScanError::Staging(std::io::Error::other(e)))?
            .map_err(ScanError::Staging)?;

        debug!(
            path = %staged.path().display(),
            size = artifact.len(),
            sha256 = artifact.sha256(),
            "staged artifact"
        );
        Ok(staged)
    }
}

fn write_staged(dir: Option<&Path>, bytes: &[u8]) -> std::io::Result<StagedFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(STAGE_PREFIX).suffix(STAGE_SUFFIX);

    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    file.write_all(bytes)?;
    file.flush()?;
    file.as_file().sync_all()?;

    // Close the handle; engines open the path themselves.
    let path = file.into_temp_path();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o400))?;
    }

    Ok(StagedFile { path })
}

/// A staged artifact on disk. Deleted on release or drop.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
}

impl StagedFile {
    /// Path handed to engine binaries
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now, reporting any error.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the unlink. The path is not retried.
    pub fn release(self) -> std::io::Result<()> {
        self.path.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stages_bytes_into_unique_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = ArtifactStaging::new(Some(dir.path().to_path_buf()));
        let artifact = Artifact::new(b"sample bytes".to_vec());

        let a = staging.stage(&artifact).await.unwrap();
        let b = staging.stage(&artifact).await.unwrap();

        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read(a.path()).unwrap(), b"sample bytes");
        assert!(a.path().starts_with(dir.path()));

        let name = a.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(STAGE_PREFIX));
        assert!(name.ends_with(STAGE_SUFFIX));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn staged_file_is_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let staging = ArtifactStaging::new(Some(dir.path().to_path_buf()));
        let staged = staging.stage(&Artifact::new(b"x".to_vec())).await.unwrap();

        let mode = std::fs::metadata(staged.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o400);
    }

    #[tokio::test]
    async fn release_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = ArtifactStaging::new(Some(dir.path().to_path_buf()));
        let staged = staging.stage(&Artifact::new(b"x".to_vec())).await.unwrap();
        let path = staged.path().to_path_buf();

        assert!(path.exists());
        staged.release().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = ArtifactStaging::new(Some(dir.path().to_path_buf()));
        let staged = staging.stage(&Artifact::new(b"x".to_vec())).await.unwrap();
        let path = staged.path().to_path_buf();

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_directory_is_a_staging_error() {
        let dir = tempfile::tempdir().unwrap();
        let staging = ArtifactStaging::new(Some(dir.path().join("does-not-exist")));

        let err = staging.stage(&Artifact::new(b"x".to_vec())).await.unwrap_err();
        assert!(matches!(err, ScanError::Staging(_)));
    }
}
