//! Scan and engine configuration.
//!
//! The library never reads files on its own: callers deserialize these
//! structs from wherever they keep configuration and pass them in.

use malscan_core::{EngineDescriptor, Platform, Result, ScanError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::adapter::EngineProfile;
use crate::parser::ParserSpec;
use crate::presets::Preset;

/// Request-level limits shared by every engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Maximum wall-clock time for one multi-engine scan request (seconds).
    #[serde(default = "default_global_deadline")]
    pub global_deadline_secs: u64,

    /// Default budget for each engine subprocess (seconds).
    #[serde(default = "default_process_timeout")]
    pub process_timeout_secs: u64,

    /// Where artifacts are staged (default: system temp dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            global_deadline_secs: default_global_deadline(),
            process_timeout_secs: default_process_timeout(),
            staging_dir: None,
        }
    }
}

impl ScanSettings {
    #[must_use]
    pub const fn global_deadline(&self) -> Duration {
        Duration::from_secs(self.global_deadline_secs)
    }

    #[must_use]
    pub const fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }

    /// Check that both budgets are non-zero and nest.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Config` describing the first violated limit.
    pub fn validate(&self) -> Result<()> {
        if self.global_deadline_secs == 0 {
            return Err(ScanError::Config("global_deadline_secs must be positive".into()));
        }
        if self.process_timeout_secs == 0 {
            return Err(ScanError::Config("process_timeout_secs must be positive".into()));
        }
        if self.process_timeout_secs > self.global_deadline_secs {
            return Err(ScanError::Config(format!(
                "process_timeout_secs ({}) exceeds global_deadline_secs ({})",
                self.process_timeout_secs, self.global_deadline_secs
            )));
        }
        Ok(())
    }
}

/// One engine, either a preset with overrides or fully custom.
///
/// Every unset field falls back to the preset's value. Without a preset,
/// `name`, both paths, `parser`, and both update phrases are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<Preset>,

    /// Set to false to leave this engine out of the registry (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_args: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_args: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_check_args: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_args: Option<Vec<String>>,

    /// Wrapper binary for updater runs, e.g. `/usr/bin/sudo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevate_with: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_exit_codes: Option<Vec<i32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_to_date_phrase: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_success_phrase: Option<String>,

    /// Per-engine subprocess budget (default: `ScanSettings::process_timeout_secs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    /// Output grammar (default: the preset's)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser: Option<ParserSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: None,
            preset: None,
            enabled: default_enabled(),
            engine_path: None,
            update_path: None,
            platform: None,
            scan_args: None,
            version_args: None,
            update_check_args: None,
            update_args: None,
            elevate_with: None,
            accepted_exit_codes: None,
            up_to_date_phrase: None,
            update_success_phrase: None,
            timeout_secs: None,
            authors: Vec::new(),
            references: Vec::new(),
            parser: None,
        }
    }
}

impl EngineConfig {
    /// The AVG preset at its standard paths
    #[must_use]
    pub fn avg() -> Self {
        Self {
            preset: Some(Preset::Avg),
            ..Self::default()
        }
    }

    /// Engine name after preset fallback, if determinable
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| self.preset.map(|p| p.defaults().name.to_string()))
    }

    /// Merge with preset defaults and validate.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Config` for a missing required field, an empty
    /// name, or a timeout that is zero or exceeds the global deadline.
    pub fn resolve(&self, settings: &ScanSettings) -> Result<(EngineProfile, ParserSpec)> {
        let name = self
            .display_name()
            .ok_or_else(|| ScanError::Config("engine without preset needs a name".into()))?;
        if name.trim().is_empty() {
            return Err(ScanError::Config("engine name must not be empty".into()));
        }

        let missing = |field: &str| {
            ScanError::Config(format!("engine {name}: {field} is required without a preset"))
        };
        let base = self.preset.map(EngineProfile::from_preset);

        let engine_path = self
            .engine_path
            .clone()
            .or_else(|| base.as_ref().map(|b| b.descriptor.engine_path.clone()))
            .ok_or_else(|| missing("engine_path"))?;
        let update_path = self
            .update_path
            .clone()
            .or_else(|| base.as_ref().map(|b| b.descriptor.update_path.clone()))
            .ok_or_else(|| missing("update_path"))?;
        let up_to_date_phrase = self
            .up_to_date_phrase
            .clone()
            .or_else(|| base.as_ref().map(|b| b.up_to_date_phrase.clone()))
            .ok_or_else(|| missing("up_to_date_phrase"))?;
        let update_success_phrase = self
            .update_success_phrase
            .clone()
            .or_else(|| base.as_ref().map(|b| b.update_success_phrase.clone()))
            .ok_or_else(|| missing("update_success_phrase"))?;
        let parser = self
            .parser
            .clone()
            .or_else(|| self.preset.map(Preset::parser_spec))
            .ok_or_else(|| missing("parser"))?;

        let timeout = self
            .timeout_secs
            .map_or_else(|| settings.process_timeout(), Duration::from_secs);
        if timeout.is_zero() {
            return Err(ScanError::Config(format!("engine {name}: timeout_secs must be positive")));
        }
        if timeout > settings.global_deadline() {
            return Err(ScanError::Config(format!(
                "engine {name}: timeout of {}s exceeds the global deadline of {}s",
                timeout.as_secs(),
                settings.global_deadline_secs
            )));
        }

        let authors = if self.authors.is_empty() {
            base.as_ref().map(|b| b.descriptor.authors.clone()).unwrap_or_default()
        } else {
            self.authors.clone()
        };
        let references = if self.references.is_empty() {
            base.as_ref().map(|b| b.descriptor.references.clone()).unwrap_or_default()
        } else {
            self.references.clone()
        };

        let profile = EngineProfile {
            descriptor: EngineDescriptor {
                name,
                platform: self
                    .platform
                    .or_else(|| base.as_ref().map(|b| b.descriptor.platform))
                    .unwrap_or_default(),
                engine_path,
                update_path,
                authors,
                references,
            },
            scan_args: pick_args(
                self.scan_args.as_ref(),
                base.as_ref().map(|b| &b.scan_args),
                &["{file}"],
            ),
            version_args: pick_args(
                self.version_args.as_ref(),
                base.as_ref().map(|b| &b.version_args),
                &["--version"],
            ),
            update_check_args: pick_args(
                self.update_check_args.as_ref(),
                base.as_ref().map(|b| &b.update_check_args),
                &[],
            ),
            update_args: pick_args(
                self.update_args.as_ref(),
                base.as_ref().map(|b| &b.update_args),
                &[],
            ),
            elevate_with: self.elevate_with.clone(),
            accepted_exit_codes: self
                .accepted_exit_codes
                .clone()
                .or_else(|| base.as_ref().map(|b| b.accepted_exit_codes.clone()))
                .unwrap_or_else(|| vec![0]),
            up_to_date_phrase,
            update_success_phrase,
            timeout,
        };

        Ok((profile, parser))
    }
}

/// Own value, else the preset's, else `default`.
fn pick_args(own: Option<&Vec<String>>, preset: Option<&Vec<String>>, default: &[&str]) -> Vec<String> {
    own.or(preset)
        .cloned()
        .unwrap_or_else(|| default.iter().map(ToString::to_string).collect())
}

// Default value functions for serde.
const fn default_global_deadline() -> u64 {
    60
}

const fn default_process_timeout() -> u64 {
    15
}

const fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::InfectionRule;

    #[test]
    fn test_default_settings() {
        let settings = ScanSettings::default();
        assert_eq!(settings.global_deadline(), Duration::from_secs(60));
        assert_eq!(settings.process_timeout(), Duration::from_secs(15));
        assert!(settings.staging_dir.is_none());
        settings.validate().unwrap();
    }

    #[test]
    fn test_process_timeout_must_nest_in_deadline() {
        let settings = ScanSettings {
            global_deadline_secs: 10,
            process_timeout_secs: 15,
            staging_dir: None,
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds"));

        let zero = ScanSettings {
            global_deadline_secs: 0,
            ..ScanSettings::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_avg_preset_resolves() {
        let (profile, parser) = EngineConfig::avg().resolve(&ScanSettings::default()).unwrap();

        assert_eq!(profile.descriptor.name, "AVG");
        assert_eq!(profile.descriptor.platform, Platform::Linux32);
        assert_eq!(profile.descriptor.engine_path, PathBuf::from("/usr/bin/avgscan"));
        assert_eq!(profile.descriptor.authors, vec!["blacktop".to_string()]);
        assert_eq!(profile.scan_args, vec!["{file}".to_string()]);
        assert_eq!(profile.update_check_args, vec!["-c".to_string()]);
        assert_eq!(profile.timeout, Duration::from_secs(15));
        assert_eq!(parser, Preset::Avg.parser_spec());
    }

    #[test]
    fn test_overrides_win_over_preset() {
        let config = EngineConfig {
            name: Some("avg-sandbox".into()),
            engine_path: Some("/opt/avg/bin/avgscan".into()),
            elevate_with: Some("/usr/bin/sudo".into()),
            timeout_secs: Some(30),
            ..EngineConfig::avg()
        };
        let (profile, _) = config.resolve(&ScanSettings::default()).unwrap();

        assert_eq!(profile.descriptor.name, "avg-sandbox");
        assert_eq!(profile.descriptor.engine_path, PathBuf::from("/opt/avg/bin/avgscan"));
        assert_eq!(profile.descriptor.update_path, PathBuf::from("/usr/bin/avgupdate"));
        assert_eq!(profile.elevate_with, Some(PathBuf::from("/usr/bin/sudo")));
        assert_eq!(profile.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_timeout_beyond_deadline_is_rejected() {
        let config = EngineConfig {
            timeout_secs: Some(120),
            ..EngineConfig::avg()
        };
        let err = config.resolve(&ScanSettings::default()).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
        assert!(err.to_string().contains("AVG"));
    }

    #[test]
    fn test_custom_engine_requires_parser() {
        let config = EngineConfig {
            name: Some("clam".into()),
            engine_path: Some("/usr/bin/clamscan".into()),
            update_path: Some("/usr/bin/freshclam".into()),
            up_to_date_phrase: Some("is up to date".into()),
            update_success_phrase: Some("updated".into()),
            ..EngineConfig::default()
        };
        let err = config.resolve(&ScanSettings::default()).unwrap_err();
        assert!(err.to_string().contains("parser"));

        let nameless = EngineConfig::default();
        assert!(nameless.resolve(&ScanSettings::default()).is_err());
    }

    #[test]
    fn test_custom_engine_from_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            name = "clam"
            engine_path = "/usr/bin/clamscan"
            update_path = "/usr/bin/freshclam"
            platform = "linux64"
            scan_args = ["--no-summary", "{file}"]
            accepted_exit_codes = [0, 1]
            up_to_date_phrase = "is up to date"
            update_success_phrase = "updated (version"

            [parser]
            label = '^\S+:\s+(.+)\s+FOUND$'
            [parser.infection]
            rule = "presence"
            infected = 'FOUND$'
            clean = ': OK$'
            "#,
        )
        .unwrap();
        assert!(config.enabled);

        let (profile, parser) = config.resolve(&ScanSettings::default()).unwrap();
        assert_eq!(profile.descriptor.platform, Platform::Linux64);
        assert_eq!(profile.version_args, vec!["--version".to_string()]);
        assert!(profile.update_args.is_empty());
        assert_eq!(profile.accepted_exit_codes, vec![0, 1]);
        assert!(matches!(parser.infection, InfectionRule::Presence { .. }));
    }

    #[test]
    fn test_settings_from_partial_toml() {
        let settings: ScanSettings = toml::from_str("global_deadline_secs = 30").unwrap();
        assert_eq!(settings.global_deadline_secs, 30);
        assert_eq!(settings.process_timeout_secs, 15);
    }
}
