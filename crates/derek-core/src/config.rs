use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{PRESET_RELAYS, RELAY_URL};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        match dirs::config_dir() {
            Some(dir) => Self::new(dir.join("derek-site")),
            None => Self::new("derek_data"),
        }
    }
}

/// A well-known relay offered alongside the user's primary relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetRelay {
    pub url: String,
    pub name: String,
}

impl PresetRelay {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }
}

pub fn default_preset_relays() -> Vec<PresetRelay> {
    PRESET_RELAYS
        .iter()
        .map(|(url, name)| PresetRelay::new(*url, *name))
        .collect()
}

/// Relay routing configuration consumed by the pool.
///
/// Serialized in camelCase so files written by the web client load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    pub relay_url: String,
    #[serde(default)]
    pub use_all_relays: bool,
    #[serde(default = "default_preset_relays")]
    pub preset_relays: Vec<PresetRelay>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay_url: RELAY_URL.to_string(),
            use_all_relays: false,
            preset_relays: default_preset_relays(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Relay configuration persisted to `<data_dir>/config.json`
pub struct ConfigStorage {
    path: PathBuf,
    pub config: RelayConfig,
}

impl ConfigStorage {
    /// Load the stored config, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn new(core: &CoreConfig) -> Self {
        let path = core.data_dir.join(CONFIG_FILE);
        let config = Self::load_from_file(&path).unwrap_or_default();
        Self { path, config }
    }

    fn load_from_file(path: &Path) -> Option<RelayConfig> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.config)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn set_relay_url(&mut self, url: &str) -> Result<(), ConfigError> {
        self.config.relay_url = url.to_string();
        self.save()
    }

    pub fn set_use_all_relays(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.config.use_all_relays = enabled;
        self.save()
    }
}
