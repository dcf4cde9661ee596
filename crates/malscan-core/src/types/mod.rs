//! Domain types shared across malscan crates.

pub mod engine;
pub mod report;
pub mod verdict;

pub use engine::{EngineDescriptor, EngineStatus, Platform, RawScanOutput, UpdateOutcome};
pub use report::{ArtifactSummary, ReportSummary, ScanReport};
pub use verdict::{Outcome, Verdict, VerdictError, VerdictErrorKind, VerdictMetadata, VerdictState};
