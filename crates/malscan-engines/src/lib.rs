//! # malscan-engines
//!
//! Runs many independent, slow, unreliable antivirus engines against one
//! artifact and merges what they say into a single [`ScanReport`].
//!
//! No engine can take another down with it: every failure (missing binary,
//! hung process, garbled output, even a panic) becomes data in that engine's
//! verdict, and the request as a whole fails only if the artifact cannot be
//! staged.
//!
//! ## Data Flow
//!
//! ```text
//! Artifact bytes
//!   -> ArtifactStaging::stage()        malscan_*.data, mode 0400
//!   -> EngineRegistry partition        not installed => verdict, no dispatch
//!   -> JoinSet, one task per engine    EngineAdapter::scan(path)
//!        CliEngine -> ProcessRunner    argv only, per-process timeout
//!                  -> OutputParser     marker grammar -> ParsedScan
//!   -> timeout_at(global deadline)     stragglers => "orchestrator timeout"
//!   -> StagedFile::release()
//!   -> ScanReport { verdicts: engine -> Verdict }
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use malscan_engines::{EngineConfig, EngineRegistry, ScanOrchestrator, ScanSettings, TokioProcessRunner};
//!
//! # async fn demo() -> malscan_core::Result<()> {
//! let settings = ScanSettings::default();
//! let registry = EngineRegistry::from_configs(
//!     &[EngineConfig::avg()],
//!     &settings,
//!     Arc::new(TokioProcessRunner),
//! )?;
//! let orchestrator = ScanOrchestrator::new(registry, &settings);
//!
//! let report = orchestrator.scan_bytes(b"suspicious bytes".to_vec()).await?;
//! for (engine, verdict) in &report.verdicts {
//!     println!("{engine}: {:?}", verdict.state());
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod artifact;
pub mod config;
pub mod hash;
pub mod orchestrator;
pub mod parser;
pub mod presets;
pub mod registry;
pub mod runner;
pub mod staging;

pub use adapter::{is_executable, CliEngine, EngineAdapter, EngineProfile};
pub use artifact::Artifact;
pub use config::{EngineConfig, ScanSettings};
pub use orchestrator::ScanOrchestrator;
pub use parser::{MarkerParser, OutputParser, ParseError, ParsedScan, ParserSpec};
pub use presets::Preset;
pub use registry::EngineRegistry;
pub use runner::{ProcessRunner, ProcessSpec, RunError, TokioProcessRunner};
pub use staging::{ArtifactStaging, StagedFile};

pub use malscan_core::ScanReport;
