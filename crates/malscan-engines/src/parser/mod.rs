//! Engine output parsing.
//!
//! Each engine family ships its own grammar. Parsers are isolated behind
//! [`OutputParser`] so that an engine upgrade that changes its output only
//! breaks that engine's verdicts, never the request.

pub mod marker;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use malscan_core::RawScanOutput;
use thiserror::Error;

pub use marker::{InfectionRule, MarkerParser, ParserSpec};

/// Fields extracted from a successful scan run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedScan {
    pub infected: bool,
    pub label: Option<String>,
    pub engine_version: Option<String>,
    pub definitions_date: Option<DateTime<Utc>>,
}

/// Output did not match the engine's grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No line matched a required marker
    #[error("no line matched the {0} marker")]
    MissingMarker(&'static str),

    /// A marker matched but its value could not be interpreted
    #[error("could not interpret {field} value {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// Converts one engine family's raw output into normalized fields.
pub trait OutputParser: Send + Sync {
    /// Parse the output of a scan invocation.
    fn parse_scan(&self, output: &RawScanOutput) -> Result<ParsedScan, ParseError>;

    /// Extract the engine version from a version query, if recognizable.
    fn parse_version(&self, output: &RawScanOutput) -> Option<String>;
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y:%m:%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%a %b %e %H:%M:%S %Y",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

/// Parse the loosely formatted timestamps engines print for their definitions.
///
/// Offsets are honoured when present; naive timestamps are taken as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}
