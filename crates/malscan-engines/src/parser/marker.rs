//! Declarative, marker-based output extraction.
//!
//! A [`ParserSpec`] names one regular expression per field. Patterns are
//! matched against the non-empty, trimmed lines of stdout; the first line
//! that matches wins and its first capture group (or the whole match, if the
//! pattern has no groups) becomes the field value. The infection rule is the
//! only required marker: when it cannot be located the parse fails instead
//! of guessing.

use malscan_core::{RawScanOutput, ScanError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{parse_timestamp, OutputParser, ParseError, ParsedScan};

/// Used when a spec does not name its own version marker: any line mentioning
/// "version", value after the first colon.
pub const DEFAULT_VERSION_PATTERN: &str = r"(?i)version[^:]*:\s*(.+)$";

/// How the infected/clean decision is read from the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum InfectionRule {
    /// Capture group 1 is a detection count; greater than zero means infected
    Count { pattern: String },
    /// Either pattern must match somewhere; `infected` is checked first
    Presence { infected: String, clean: String },
}

/// Declarative grammar for one engine family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserSpec {
    /// Required infected/clean marker
    pub infection: InfectionRule,
    /// Malware family / signature name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Engine or database version printed with scan results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    /// Definitions release date printed with scan results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions_date: Option<String>,
    /// Version line in the output of the version query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug)]
enum CompiledRule {
    Count(Regex),
    Presence { infected: Regex, clean: Regex },
}

/// [`OutputParser`] compiled from a [`ParserSpec`].
#[derive(Debug)]
pub struct MarkerParser {
    engine: String,
    infection: CompiledRule,
    label: Option<Regex>,
    engine_version: Option<Regex>,
    definitions_date: Option<Regex>,
    version: Regex,
}

impl MarkerParser {
    /// Compile every pattern in `spec`.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Config` naming the engine and field of the first
    /// invalid pattern.
    pub fn compile(engine: &str, spec: &ParserSpec) -> malscan_core::Result<Self> {
        let re = |field: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                ScanError::Config(format!("engine {engine}: invalid {field} pattern: {e}"))
            })
        };
        let opt = |field: &str, pattern: Option<&String>| {
            pattern.map(|p| re(field, p.as_str())).transpose()
        };

        let infection = match &spec.infection {
            InfectionRule::Count { pattern } => CompiledRule::Count(re("infection", pattern.as_str())?),
            InfectionRule::Presence { infected, clean } => CompiledRule::Presence {
                infected: re("infected", infected.as_str())?,
                clean: re("clean", clean.as_str())?,
            },
        };

        Ok(Self {
            engine: engine.to_string(),
            infection,
            label: opt("label", spec.label.as_ref())?,
            engine_version: opt("engine_version", spec.engine_version.as_ref())?,
            definitions_date: opt("definitions_date", spec.definitions_date.as_ref())?,
            version: re(
                "version",
                spec.version.as_deref().unwrap_or(DEFAULT_VERSION_PATTERN),
            )?,
        })
    }

    fn infected(&self, lines: &[String]) -> Result<bool, ParseError> {
        match &self.infection {
            CompiledRule::Count(re) => {
                let value = first_capture(re, lines).ok_or(ParseError::MissingMarker("infection"))?;
                value
                    .parse::<u64>()
                    .map(|count| count > 0)
                    .map_err(|_| ParseError::InvalidValue {
                        field: "infection",
                        value,
                    })
            }
            CompiledRule::Presence { infected, clean } => {
                if lines.iter().any(|l| infected.is_match(l)) {
                    Ok(true)
                } else if lines.iter().any(|l| clean.is_match(l)) {
                    Ok(false)
                } else {
                    Err(ParseError::MissingMarker("infection"))
                }
            }
        }
    }
}

impl OutputParser for MarkerParser {
    fn parse_scan(&self, output: &RawScanOutput) -> Result<ParsedScan, ParseError> {
        let lines = output.lines();
        let infected = self.infected(&lines)?;

        let label = if infected {
            let label = self.label.as_ref().and_then(|re| first_capture(re, &lines));
            if label.is_none() {
                warn!(engine = %self.engine, "detection reported without a malware label");
            }
            label
        } else {
            None
        };

        let engine_version = self
            .engine_version
            .as_ref()
            .and_then(|re| first_capture(re, &lines));

        let definitions_date = self
            .definitions_date
            .as_ref()
            .and_then(|re| first_capture(re, &lines))
            .and_then(|raw| {
                let parsed = parse_timestamp(&raw);
                if parsed.is_none() {
                    warn!(engine = %self.engine, value = %raw, "unparseable definitions date");
                }
                parsed
            });

        Ok(ParsedScan {
            infected,
            label,
            engine_version,
            definitions_date,
        })
    }

    fn parse_version(&self, output: &RawScanOutput) -> Option<String> {
        first_capture(&self.version, &output.lines())
    }
}

/// First capture group of the first matching line (whole match if no groups).
fn first_capture(re: &Regex, lines: &[String]) -> Option<String> {
    lines.iter().find_map(|line| {
        let caps = re.captures(line)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        let value = m.as_str().trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(text: &str) -> RawScanOutput {
        RawScanOutput {
            stdout: text.as_bytes().to_vec(),
            ..RawScanOutput::default()
        }
    }

    fn count_spec() -> ParserSpec {
        ParserSpec {
            infection: InfectionRule::Count {
                pattern: r"^Infected files:\s*(\d+)".into(),
            },
            label: Some(r"^\S+:\s+(.+)\s+FOUND$".into()),
            engine_version: Some(r"^Engine version:\s*(.+)$".into()),
            definitions_date: None,
            version: None,
        }
    }

    #[test]
    fn count_rule_detects_infection_and_label() {
        let parser = MarkerParser::compile("clam", &count_spec()).unwrap();
        let parsed = parser
            .parse_scan(&output(
                "/tmp/x: Eicar-Signature FOUND\n\n--- SUMMARY ---\nEngine version: 0.103.8\nInfected files: 1\n",
            ))
            .unwrap();

        assert!(parsed.infected);
        assert_eq!(parsed.label.as_deref(), Some("Eicar-Signature"));
        assert_eq!(parsed.engine_version.as_deref(), Some("0.103.8"));
    }

    #[test]
    fn count_rule_zero_is_clean_without_label() {
        let parser = MarkerParser::compile("clam", &count_spec()).unwrap();
        let parsed = parser
            .parse_scan(&output("/tmp/x: OK\nInfected files: 0\n"))
            .unwrap();

        assert!(!parsed.infected);
        assert!(parsed.label.is_none());
    }

    #[test]
    fn missing_marker_fails_instead_of_guessing() {
        let parser = MarkerParser::compile("clam", &count_spec()).unwrap();
        let err = parser.parse_scan(&output("Segmentation fault\n")).unwrap_err();
        assert_eq!(err, ParseError::MissingMarker("infection"));

        let err = parser.parse_scan(&output("")).unwrap_err();
        assert_eq!(err, ParseError::MissingMarker("infection"));
    }

    #[test]
    fn presence_rule() {
        let spec = ParserSpec {
            infection: InfectionRule::Presence {
                infected: "THREAT".into(),
                clean: "no threats".into(),
            },
            label: Some(r"THREAT\s+(\S+)".into()),
            engine_version: None,
            definitions_date: None,
            version: None,
        };
        let parser = MarkerParser::compile("p", &spec).unwrap();

        let infected = parser.parse_scan(&output("THREAT Win32.Foo\n")).unwrap();
        assert!(infected.infected);
        assert_eq!(infected.label.as_deref(), Some("Win32.Foo"));

        let clean = parser.parse_scan(&output("scan done, no threats\n")).unwrap();
        assert!(!clean.infected);

        assert!(parser.parse_scan(&output("???\n")).is_err());
    }

    #[test]
    fn detection_without_label_line_stays_infected() {
        let parser = MarkerParser::compile("clam", &count_spec()).unwrap();

        let parsed = parser
            .parse_scan(&output("Scanning...\nInfected files: 2\n"))
            .unwrap();
        assert!(parsed.infected);
        assert!(parsed.label.is_none());
    }

    #[test]
    fn unparseable_date_is_absent_not_fatal() {
        let mut spec = count_spec();
        spec.definitions_date = Some(r"^Database date:\s*(.+)$".into());
        let parser = MarkerParser::compile("clam", &spec).unwrap();

        let parsed = parser
            .parse_scan(&output("Database date: Problem\nInfected files: 0\n"))
            .unwrap();
        assert!(parsed.definitions_date.is_none());
    }

    #[test]
    fn default_version_marker() {
        let parser = MarkerParser::compile("clam", &count_spec()).unwrap();
        let version = parser.parse_version(&output(
            "AVG command line scanner\nProgram version: 13.0.3114\n",
        ));
        assert_eq!(version.as_deref(), Some("13.0.3114"));

        assert!(parser.parse_version(&output("usage: scanner FILE\n")).is_none());
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let mut spec = count_spec();
        spec.label = Some("(unclosed".into());
        let err = MarkerParser::compile("broken", &spec).unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(err.to_string().contains("label"));
    }

    #[test]
    fn spec_deserializes_from_toml() {
        let spec: ParserSpec = toml::from_str(
            r#"
            label = 'identified\s+(.+)$'
            [infection]
            rule = "count"
            pattern = 'Infections found\s*:\s*(\d+)'
            "#,
        )
        .unwrap();
        assert!(matches!(spec.infection, InfectionRule::Count { .. }));
        assert!(spec.version.is_none());
    }
}
