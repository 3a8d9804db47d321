//! Configuration loading and defaults for attention-focusd.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::backend::BackendKind;
use crate::blocklist::Blocklist;

/// Main configuration for attention-focusd.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window title substrings that are never auto-focused (case-insensitive).
    pub blocklist: Vec<String>,

    /// Compositor backend (default: auto).
    pub backend: BackendKind,

    /// Dry run mode: log activations instead of performing them.
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Check the blocklist entries.
    ///
    /// A blank entry is contained in every title and would block all windows,
    /// so it is rejected. Leading or trailing whitespace is kept when matching
    /// and only warned about.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.blocklist {
            if entry.trim().is_empty() {
                anyhow::bail!("Blocklist entry {entry:?} is blank and would block every window");
            }
            if entry.trim() != entry {
                warn!(
                    "Blocklist entry {:?} has surrounding whitespace, which is part of the match",
                    entry
                );
            }
        }
        Ok(())
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        if let Some(default_path) = default_path()
            && default_path.exists()
        {
            return Self::load(&default_path);
        }

        Ok(Self::default())
    }

    /// Build the blocklist the attention handler filters with.
    pub fn blocklist(&self) -> Blocklist {
        Blocklist::new(&self.blocklist)
    }
}

/// `$XDG_CONFIG_HOME/attention-focusd/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("attention-focusd").join("config.toml"))
}
