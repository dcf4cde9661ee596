//! Normalized per-engine scan results.
//!
//! A verdict is one of three states: clean, infected, or inconclusive. The
//! inconclusive state carries an error and, by construction, no infection
//! flag: a missing result must never read as "clean".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EngineError;

/// Classification of a verdict error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictErrorKind {
    /// Engine binaries missing or platform-gated
    NotInstalled,
    /// Subprocess killed by its own timeout
    ProcessTimeout,
    /// Binary could not be executed
    SpawnFailed,
    /// Exit status outside the engine's accepted set
    UnexpectedExit,
    /// Output did not match the engine's grammar
    OutputFormat,
    /// Version query failed
    VersionQuery,
    /// Global request deadline elapsed
    OrchestratorTimeout,
    /// Adapter task panicked
    AdapterPanic,
}

/// Why an engine produced no usable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictError {
    /// Error class
    pub kind: VerdictErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl From<&EngineError> for VerdictError {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for VerdictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// What an engine concluded about the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Engine ran and found nothing
    Clean,
    /// Engine ran and flagged the artifact
    Infected {
        /// Malware family or signature name, if reported
        label: Option<String>,
    },
    /// Engine could not produce a result
    Error(VerdictError),
}

/// Coarse three-way state of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictState {
    Clean,
    Infected,
    Inconclusive,
}

/// Normalized result of one engine against one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "VerdictRecord", try_from = "VerdictRecord")]
pub struct Verdict {
    /// Engine that produced this verdict
    pub engine: String,
    /// Clean / infected / error
    pub outcome: Outcome,
    /// Engine (or database) version reported alongside the scan
    pub engine_version: Option<String>,
    /// Timestamp of the signature definitions used
    pub definitions_date: Option<DateTime<Utc>>,
    /// How long the engine ran
    pub elapsed: Option<Duration>,
}

impl Verdict {
    fn new(engine: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            engine: engine.into(),
            outcome,
            engine_version: None,
            definitions_date: None,
            elapsed: None,
        }
    }

    /// Engine ran and found nothing
    #[must_use]
    pub fn clean(engine: impl Into<String>) -> Self {
        Self::new(engine, Outcome::Clean)
    }

    /// Engine ran and flagged the artifact
    #[must_use]
    pub fn infected(engine: impl Into<String>, label: Option<String>) -> Self {
        Self::new(engine, Outcome::Infected { label })
    }

    /// Engine could not produce a result
    #[must_use]
    pub fn failed(engine: impl Into<String>, err: &EngineError) -> Self {
        Self::new(engine, Outcome::Error(err.into()))
    }

    /// Attach the engine version
    #[must_use]
    pub fn with_engine_version(mut self, version: Option<String>) -> Self {
        self.engine_version = version;
        self
    }

    /// Attach the definitions timestamp
    #[must_use]
    pub const fn with_definitions_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.definitions_date = date;
        self
    }

    /// Attach the elapsed run time
    #[must_use]
    pub const fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// Infection flag; `None` when the engine produced no result
    #[must_use]
    pub const fn infected_flag(&self) -> Option<bool> {
        match self.outcome {
            Outcome::Clean => Some(false),
            Outcome::Infected { .. } => Some(true),
            Outcome::Error(_) => None,
        }
    }

    /// Reported malware label, if infected and labelled
    #[must_use]
    pub fn infected_label(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Infected { label } => label.as_deref(),
            _ => None,
        }
    }

    /// Error detail, if the engine produced no result
    #[must_use]
    pub const fn error(&self) -> Option<&VerdictError> {
        match &self.outcome {
            Outcome::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Coarse three-way state
    #[must_use]
    pub const fn state(&self) -> VerdictState {
        match self.outcome {
            Outcome::Clean => VerdictState::Clean,
            Outcome::Infected { .. } => VerdictState::Infected,
            Outcome::Error(_) => VerdictState::Inconclusive,
        }
    }
}

/// Version and definitions metadata in the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions_date: Option<DateTime<Utc>>,
}

/// Flat wire representation of a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VerdictRecord {
    engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    infected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    infected_label: Option<String>,
    #[serde(default)]
    metadata: VerdictMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<VerdictError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u64>,
}

impl From<Verdict> for VerdictRecord {
    #[allow(clippy::cast_possible_truncation)]
    fn from(v: Verdict) -> Self {
        let infected = v.infected_flag();
        let (infected_label, error) = match v.outcome {
            Outcome::Clean => (None, None),
            Outcome::Infected { label } => (label, None),
            Outcome::Error(err) => (None, Some(err)),
        };
        Self {
            engine: v.engine,
            infected,
            infected_label,
            metadata: VerdictMetadata {
                engine_version: v.engine_version,
                definitions_date: v.definitions_date,
            },
            error,
            elapsed_ms: v.elapsed.map(|d| d.as_millis() as u64),
        }
    }
}

impl TryFrom<VerdictRecord> for Verdict {
    type Error = String;

    fn try_from(r: VerdictRecord) -> Result<Self, Self::Error> {
        let outcome = match (r.error, r.infected) {
            (Some(_), Some(_)) => {
                return Err(format!(
                    "verdict for {} carries both an error and an infection flag",
                    r.engine
                ))
            }
            (Some(err), None) => Outcome::Error(err),
            (None, Some(true)) => Outcome::Infected {
                label: r.infected_label,
            },
            (None, Some(false)) => Outcome::Clean,
            (None, None) => {
                return Err(format!(
                    "verdict for {} has neither an error nor an infection flag",
                    r.engine
                ))
            }
        };
        Ok(Self {
            engine: r.engine,
            outcome,
            engine_version: r.metadata.engine_version,
            definitions_date: r.metadata.definitions_date,
            elapsed: r.elapsed_ms.map(Duration::from_millis),
        })
    }
}
