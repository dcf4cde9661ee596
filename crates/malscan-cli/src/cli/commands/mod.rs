//! Command implementations.

pub mod config;
pub mod engines;
pub mod scan;
pub mod update;

use anyhow::Result;
use malscan_engines::{EngineRegistry, ScanOrchestrator, ScanSettings, TokioProcessRunner};
use std::sync::Arc;

use crate::config::Config;
use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration
    pub config: Config,

    /// Output format
    pub output_format: OutputFormat,

    /// Disable colors
    pub no_color: bool,
}

impl Context {
    /// Build the orchestrator, optionally restricted to `engines`.
    pub fn orchestrator(&self, settings: &ScanSettings, engines: &[String]) -> Result<ScanOrchestrator> {
        let mut registry = EngineRegistry::from_configs(
            &self.config.engines,
            settings,
            Arc::new(TokioProcessRunner),
        )?;
        if !engines.is_empty() {
            registry = registry.filtered(engines)?;
        }
        if registry.is_empty() {
            anyhow::bail!(
                "No engines enabled.\n\n\
                 Add an [[engine]] table to the config file (see `malscan config path`)."
            );
        }
        Ok(ScanOrchestrator::new(registry, settings))
    }
}
