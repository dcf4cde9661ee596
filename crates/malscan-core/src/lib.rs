//! Core types and error taxonomy for malscan.
//!
//! This crate provides the foundational types shared by the engine layer and
//! the command-line front-end:
//!
//! - **Types**: [`Verdict`], [`ScanReport`], [`EngineDescriptor`] and friends
//! - **Errors**: per-engine failures ([`EngineError`]) and request-level
//!   failures ([`ScanError`])
//!
//! # Example
//!
//! ```rust,ignore
//! use malscan_core::{ScanReport, VerdictState};
//!
//! fn print_report(report: &ScanReport) {
//!     for (engine, verdict) in &report.verdicts {
//!         match verdict.state() {
//!             VerdictState::Infected => println!("{engine}: infected"),
//!             VerdictState::Clean => println!("{engine}: clean"),
//!             VerdictState::Inconclusive => println!("{engine}: inconclusive"),
//!         }
//!     }
//! }
//! ```

mod error;
pub mod types;

pub use error::{EngineError, Result, ScanError};
pub use types::*;
