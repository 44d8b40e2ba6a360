//! Binding runtime configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the binding runtime.
///
/// Usually loaded from a `rift.toml` next to the host executable; every
/// field has a sensible default, so an absent or partial file is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Number of handle registry shards. Rounded up to a power of two.
    pub registry_shards: usize,

    /// Preallocated slots per registry shard. The registry grows past
    /// this on demand.
    pub registry_capacity: usize,

    /// Panic on stale handle access instead of returning an error.
    /// Meant for debugging sessions, not production.
    pub strict_handles: bool,

    /// Engine dynamic library to load at startup. Leave unset when the
    /// engine loads the binding and hands over its table itself.
    pub engine_library: Option<PathBuf>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            registry_shards: 16,
            registry_capacity: 256,
            strict_handles: false,
            engine_library: None,
        }
    }
}

impl BindingConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text)
    }
}
