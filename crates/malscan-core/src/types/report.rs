//! Aggregate scan report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::verdict::{Verdict, VerdictState};

/// Serializable identity of the scanned artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    /// SHA-256 hex digest
    pub sha256: String,
    /// SHA-1 hex digest
    pub sha1: String,
    /// Size in bytes
    pub size: u64,
    /// Declared or sniffed media type
    pub media_type: String,
    /// Original file name, if the submitter supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// All verdicts for one artifact, keyed by engine name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// What was scanned
    pub artifact: ArtifactSummary,
    /// When the request started
    pub started_at: DateTime<Utc>,
    /// When the last verdict was recorded
    pub finished_at: DateTime<Utc>,
    /// One verdict per registered engine
    pub verdicts: BTreeMap<String, Verdict>,
}

/// Counts of each verdict state in a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub engines: usize,
    pub clean: usize,
    pub infected: usize,
    pub inconclusive: usize,
}

impl ScanReport {
    /// Start an empty report for `artifact`.
    #[must_use]
    pub fn new(artifact: ArtifactSummary) -> Self {
        let now = Utc::now();
        Self {
            artifact,
            started_at: now,
            finished_at: now,
            verdicts: BTreeMap::new(),
        }
    }

    /// Record a verdict under its engine name.
    ///
    /// Returns the verdict previously stored for that engine, if any.
    pub fn insert(&mut self, verdict: Verdict) -> Option<Verdict> {
        self.verdicts.insert(verdict.engine.clone(), verdict)
    }

    /// Verdict for `engine`
    #[must_use]
    pub fn get(&self, engine: &str) -> Option<&Verdict> {
        self.verdicts.get(engine)
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Count verdicts by state
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        self.verdicts
            .values()
            .fold(ReportSummary::default(), |mut acc, v| {
                acc.engines += 1;
                match v.state() {
                    VerdictState::Clean => acc.clean += 1,
                    VerdictState::Infected => acc.infected += 1,
                    VerdictState::Inconclusive => acc.inconclusive += 1,
                }
                acc
            })
    }

    /// Engines that flagged the artifact, with their labels
    #[must_use]
    pub fn detections(&self) -> Vec<(&str, Option<&str>)> {
        self.verdicts
            .values()
            .filter(|v| v.state() == VerdictState::Infected)
            .map(|v| (v.engine.as_str(), v.infected_label()))
            .collect()
    }

    /// Wall-clock duration of the request in milliseconds
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn summary() -> ArtifactSummary {
        ArtifactSummary {
            sha256: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855".into(),
            sha1: "da39a3ee5e6b4b0d3255bfef95601890afd80709".into(),
            size: 0,
            media_type: "application/octet-stream".into(),
            file_name: None,
        }
    }

    #[test]
    fn insert_is_keyed_by_engine() {
        let mut report = ScanReport::new(summary());
        assert!(report.insert(Verdict::clean("AVG")).is_none());
        let previous = report.insert(Verdict::infected("AVG", None));
        assert!(previous.is_some());
        assert_eq!(report.verdicts.len(), 1);
    }

    #[test]
    fn summary_counts_three_states() {
        let mut report = ScanReport::new(summary());
        report.insert(Verdict::clean("a"));
        report.insert(Verdict::infected("b", Some("EICAR".into())));
        report.insert(Verdict::failed(
            "c",
            &EngineError::NotInstalled { engine: "c".into() },
        ));

        let s = report.summary();
        assert_eq!(
            s,
            ReportSummary {
                engines: 3,
                clean: 1,
                infected: 1,
                inconclusive: 1,
            }
        );
        assert_eq!(report.detections(), vec![("b", Some("EICAR"))]);
    }

    #[test]
    fn serializes_verdicts_as_object_keyed_by_engine() {
        let mut report = ScanReport::new(summary());
        report.insert(Verdict::clean("AVG"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["verdicts"]["AVG"]["infected"], false);
        assert_eq!(json["artifact"]["size"], 0);
    }
}
