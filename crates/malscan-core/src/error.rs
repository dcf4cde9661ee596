use std::time::Duration;

use thiserror::Error;

use crate::types::VerdictErrorKind;

/// Result type alias for request-level malscan operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Failures of a single engine.
///
/// These never abort a scan request: the orchestrator turns each one into the
/// `error` field of that engine's verdict.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine or updater binary is missing, not executable, or gated out by platform
    #[error("not installed")]
    NotInstalled {
        /// Engine name
        engine: String,
    },

    /// Subprocess exceeded its wall-clock budget and was killed
    #[error("{program} timed out after {:.1}s", .timeout.as_secs_f64())]
    ProcessTimeout {
        /// Program that was running
        program: String,
        /// Budget that was exceeded
        timeout: Duration,
    },

    /// Binary exists but could not be executed
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Reading the subprocess pipes or waiting on it failed
    #[error("i/o error while running {program}: {source}")]
    Io {
        /// Program that was running
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Engine exited with a status that carries no usable report
    #[error(
        "{program} exited with {}",
        .code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
    )]
    UnexpectedExit {
        /// Program that exited
        program: String,
        /// Exit code (`None` when terminated by a signal)
        code: Option<i32>,
        /// Captured stderr, lossily decoded
        stderr: String,
    },

    /// Engine output did not match the expected grammar
    #[error("unrecognized output from {engine}: {reason}")]
    OutputFormat {
        /// Engine name
        engine: String,
        /// What the parser could not find
        reason: String,
    },

    /// Version query produced no recognizable version line
    #[error("version query for {engine} failed: {reason}")]
    VersionQueryFailed {
        /// Engine name
        engine: String,
        /// Why the query failed
        reason: String,
    },

    /// Global request deadline elapsed before the engine finished
    #[error("orchestrator timeout")]
    DeadlineExceeded,

    /// Adapter task panicked
    #[error("adapter panicked")]
    Panicked,
}

impl EngineError {
    /// Classification stored alongside the message in a verdict
    #[must_use]
    pub const fn kind(&self) -> VerdictErrorKind {
        match self {
            Self::NotInstalled { .. } => VerdictErrorKind::NotInstalled,
            Self::ProcessTimeout { .. } => VerdictErrorKind::ProcessTimeout,
            Self::Spawn { .. } | Self::Io { .. } => VerdictErrorKind::SpawnFailed,
            Self::UnexpectedExit { .. } => VerdictErrorKind::UnexpectedExit,
            Self::OutputFormat { .. } => VerdictErrorKind::OutputFormat,
            Self::VersionQueryFailed { .. } => VerdictErrorKind::VersionQuery,
            Self::DeadlineExceeded => VerdictErrorKind::OrchestratorTimeout,
            Self::Panicked => VerdictErrorKind::AdapterPanic,
        }
    }

    /// Returns true if the engine ran out of time at either timeout layer
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ProcessTimeout { .. } | Self::DeadlineExceeded)
    }
}

/// Request-level failures: conditions outside any single engine's control.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The artifact could not be materialized on disk
    #[error("failed to stage artifact: {0}")]
    Staging(#[source] std::io::Error),

    /// Configuration is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Two engines were registered under the same name
    #[error("engine registered twice: {0}")]
    DuplicateEngine(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_installed_message_is_stable() {
        let err = EngineError::NotInstalled {
            engine: "AVG".into(),
        };
        assert_eq!(err.to_string(), "not installed");
        assert_eq!(err.kind(), VerdictErrorKind::NotInstalled);
    }

    #[test]
    fn deadline_message_is_stable() {
        assert_eq!(EngineError::DeadlineExceeded.to_string(), "orchestrator timeout");
        assert!(EngineError::DeadlineExceeded.is_timeout());
    }

    #[test]
    fn unexpected_exit_describes_signal() {
        let err = EngineError::UnexpectedExit {
            program: "/usr/bin/avgscan".into(),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "/usr/bin/avgscan exited with a signal");

        let err = EngineError::UnexpectedExit {
            program: "/usr/bin/avgscan".into(),
            code: Some(2),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "/usr/bin/avgscan exited with status 2");
    }

    #[test]
    fn process_timeout_formats_seconds() {
        let err = EngineError::ProcessTimeout {
            program: "avgscan".into(),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "avgscan timed out after 1.5s");
        assert_eq!(err.kind(), VerdictErrorKind::ProcessTimeout);
    }
}
