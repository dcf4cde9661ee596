//! Built-in engine profiles.
//!
//! A preset fills in everything an [`EngineConfig`](crate::config::EngineConfig)
//! leaves unset: binary locations, argument vectors, update phrases, accepted
//! exit codes, and the output grammar.

use malscan_core::Platform;
use serde::{Deserialize, Serialize};

use crate::parser::{InfectionRule, ParserSpec};

/// Engine families malscan knows out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// AVG command-line scanner (`avgscan` / `avgupdate`)
    Avg,
}

/// Static defaults for one preset.
#[derive(Debug)]
pub struct PresetDefaults {
    pub name: &'static str,
    pub platform: Platform,
    pub engine_path: &'static str,
    pub update_path: &'static str,
    pub scan_args: &'static [&'static str],
    pub version_args: &'static [&'static str],
    pub update_check_args: &'static [&'static str],
    pub update_args: &'static [&'static str],
    pub accepted_exit_codes: &'static [i32],
    pub up_to_date_phrase: &'static str,
    pub update_success_phrase: &'static str,
    pub authors: &'static [&'static str],
    pub references: &'static [&'static str],
}

// avgscan exit codes: 0 clean, 1 interrupted, 2 file open error, 3..=13
// detections and archive warnings. Only 1 and 2 leave no usable report.
const AVG: PresetDefaults = PresetDefaults {
    name: "AVG",
    platform: Platform::Linux32,
    engine_path: "/usr/bin/avgscan",
    update_path: "/usr/bin/avgupdate",
    scan_args: &["{file}"],
    version_args: &["--version"],
    update_check_args: &["-c"],
    update_args: &[],
    accepted_exit_codes: &[0, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13],
    up_to_date_phrase: "You are currently up-to-date",
    update_success_phrase: "Update was successfully completed.",
    authors: &["blacktop"],
    references: &["http://free.avg.com"],
};

impl Preset {
    /// Static defaults for this preset
    #[must_use]
    pub const fn defaults(self) -> &'static PresetDefaults {
        match self {
            Self::Avg => &AVG,
        }
    }

    /// Output grammar for this preset
    #[must_use]
    pub fn parser_spec(self) -> ParserSpec {
        match self {
            Self::Avg => ParserSpec {
                infection: InfectionRule::Count {
                    pattern: r"^Infections found\s*:\s*(\d+)".into(),
                },
                label: Some(r"\bidentified\s+(.+)$".into()),
                engine_version: Some(r"^Virus database version\s*:\s*(.+)$".into()),
                definitions_date: Some(r"^Virus database release date\s*:\s*(.+)$".into()),
                version: None,
            },
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Avg => write!(f, "avg"),
        }
    }
}
