//! Explicit, ordered set of engine adapters.

use malscan_core::{Result, ScanError};
use std::sync::Arc;
use tracing::debug;

use crate::adapter::{CliEngine, EngineAdapter};
use crate::config::{EngineConfig, ScanSettings};
use crate::parser::MarkerParser;
use crate::runner::ProcessRunner;

/// Registered engines, in registration order. Names are unique.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    adapters: Vec<Arc<dyn EngineAdapter>>,
}

impl EngineRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::DuplicateEngine` if the name is already taken.
    pub fn register(&mut self, adapter: Arc<dyn EngineAdapter>) -> Result<()> {
        if self.get(adapter.name()).is_some() {
            return Err(ScanError::DuplicateEngine(adapter.name().to_string()));
        }
        debug!(engine = %adapter.name(), "registered engine");
        self.adapters.push(adapter);
        Ok(())
    }

    /// Build CLI adapters for every enabled engine config.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Config` if the settings or any engine config are
    /// invalid, `ScanError::DuplicateEngine` on a name clash.
    pub fn from_configs(
        configs: &[EngineConfig],
        settings: &ScanSettings,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self> {
        settings.validate()?;

        let mut registry = Self::new();
        for config in configs.iter().filter(|c| c.enabled) {
            let (profile, spec) = config.resolve(settings)?;
            let parser = MarkerParser::compile(&profile.descriptor.name, &spec)?;
            registry.register(Arc::new(CliEngine::new(
                profile,
                Arc::new(parser),
                Arc::clone(&runner),
            )))?;
        }
        Ok(registry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn EngineAdapter>> {
        self.adapters.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Look up an engine by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn EngineAdapter>> {
        self.adapters.iter().find(|a| a.name() == name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Sub-registry containing only `names`, in registration order.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Config` naming the first unknown engine.
    pub fn filtered(&self, names: &[String]) -> Result<Self> {
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(ScanError::Config(format!(
                "unknown engine {unknown:?} (registered: {})",
                self.names().join(", ")
            )));
        }

        Ok(Self {
            adapters: self
                .adapters
                .iter()
                .filter(|a| names.iter().any(|n| n == a.name()))
                .cloned()
                .collect(),
        })
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.names())
            .finish()
    }
}
