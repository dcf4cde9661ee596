//! Engine metadata, raw process output, and update outcomes.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

/// Platform gate for an engine binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Runs anywhere the binary exists
    #[default]
    Any,
    /// 32-bit x86 Linux build (also runs on x86_64 hosts with multilib)
    Linux32,
    /// 64-bit Linux build
    Linux64,
}

impl Platform {
    /// Whether a binary built for this platform runs on the given OS/arch pair.
    ///
    /// `os` and `arch` use the vocabulary of [`std::env::consts`].
    #[must_use]
    pub fn supports(self, os: &str, arch: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Linux32 => os == "linux" && matches!(arch, "x86" | "x86_64"),
            Self::Linux64 => {
                os == "linux"
                    && matches!(
                        arch,
                        "x86_64" | "aarch64" | "powerpc64" | "riscv64" | "s390x" | "loongarch64"
                    )
            }
        }
    }

    /// Whether this platform gate passes on the running host
    #[must_use]
    pub fn supports_host(self) -> bool {
        self.supports(std::env::consts::OS, std::env::consts::ARCH)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Linux32 => write!(f, "linux32"),
            Self::Linux64 => write!(f, "linux64"),
        }
    }
}

/// Static metadata describing one registered engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDescriptor {
    /// Unique engine name, used as the report key
    pub name: String,
    /// Platform gate
    pub platform: Platform,
    /// Scanner binary
    pub engine_path: PathBuf,
    /// Definitions updater binary
    pub update_path: PathBuf,
    /// Adapter authors
    #[serde(default)]
    pub authors: Vec<String>,
    /// Vendor or documentation links
    #[serde(default)]
    pub references: Vec<String>,
}

/// Unparsed capture of one engine invocation.
#[derive(Debug, Clone, Default)]
pub struct RawScanOutput {
    /// Captured stdout
    pub stdout: Vec<u8>,
    /// Captured stderr
    pub stderr: Vec<u8>,
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Wall-clock time from spawn to exit
    pub elapsed: Duration,
}

impl RawScanOutput {
    /// Stdout decoded as UTF-8, replacing invalid sequences
    #[must_use]
    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Stderr decoded as UTF-8, replacing invalid sequences
    #[must_use]
    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    /// Non-empty, trimmed stdout lines
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.stdout_text()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Whether any stdout line contains `phrase`
    #[must_use]
    pub fn contains_line(&self, phrase: &str) -> bool {
        self.stdout_text().lines().any(|l| l.contains(phrase))
    }
}

/// Result of a definitions update attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Updater ran and reported success
    Updated,
    /// Nothing to do; the updater was not run
    AlreadyUpToDate,
    /// Updater ran but did not report success
    UpdateFailed(String),
}

impl std::fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Updated => write!(f, "updated"),
            Self::AlreadyUpToDate => write!(f, "already up to date"),
            Self::UpdateFailed(reason) => write!(f, "update failed: {reason}"),
        }
    }
}

/// Availability snapshot for one engine, as shown by `malscan engines`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Static metadata
    pub descriptor: EngineDescriptor,
    /// Both binaries present and executable, platform gate passed
    pub installed: bool,
    /// Reported engine version (None if not installed or query failed)
    pub version: Option<String>,
    /// Version query failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_error: Option<String>,
}
