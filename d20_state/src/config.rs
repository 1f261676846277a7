//! Runtime configuration, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::StateError;

/// Tunables for a game runtime. Every field has a default, so an empty
/// document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Keep entity contexts spawned by event dispatch alive after their
    /// action finishes, so the context graph can be inspected afterwards.
    pub retain_dispatch_contexts: bool,

    /// Maximum nesting of forwarded command chains (aliases, chained RPC).
    pub max_rpc_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            retain_dispatch_contexts: false,
            max_rpc_depth: 32,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, StateError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
