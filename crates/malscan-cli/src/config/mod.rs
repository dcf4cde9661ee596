//! Configuration management.
//!
//! Lookup order: `--config`, then `$MALSCAN_CONFIG` (both handled by clap),
//! then `config.toml` in the platform config directory. A missing file at
//! the platform location means defaults; a missing file that was asked for
//! explicitly is an error.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use malscan_engines::{EngineConfig, ScanSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default output format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,

    /// Request limits and staging location.
    #[serde(default)]
    pub scan: ScanSettings,

    /// Engines, in report order.
    #[serde(default = "default_engines", rename = "engine")]
    pub engines: Vec<EngineConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_format: None,
            scan: ScanSettings::default(),
            engines: default_engines(),
        }
    }
}

fn default_engines() -> Vec<EngineConfig> {
    vec![EngineConfig::avg()]
}

impl Config {
    /// Platform config file path.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("org", "malscan", "malscan")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Path that will be read: the explicit one, else the platform default.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        explicit.map_or_else(Self::default_path, |p| Ok(p.to_path_buf()))
    }

    /// Load configuration, returning it with the path it came from.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf)> {
        let path = Self::resolve_path(explicit)?;

        if !path.exists() {
            if explicit.is_some() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok((Self::default(), path));
        }

        let config = Self::from_file(&path)?;
        Ok((config, path))
    }

    /// Parse and validate one file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.scan.validate()?;

        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }
}
