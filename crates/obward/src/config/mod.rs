//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use crate::sync::plan::SyncPlan;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl SyncConfig {
    /// Declared plan from the configured table list and deferred edges.
    ///
    /// When `derive_order` is set the engine caller derives the order from
    /// the reflected schema instead; see [`SyncPlan::from_tables`].
    pub fn declared_plan(&self) -> SyncPlan {
        let mut plan = SyncPlan::new(self.tables.clone(), self.deferred_edges.clone());
        if let Some(chunk) = self.chunk_size {
            plan = plan.with_chunk_size(chunk);
        }
        plan
    }
}
