//! Registry configuration, loaded from TOML.
//!
//! ```toml
//! owner = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
//! caller = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
//!
//! [storage]
//! db_path = "sigledger.db"
//!
//! [logging]
//! filter = "sigledger=info"
//!
//! [events]
//! trace = true
//! ```

use crate::types::Identity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "SIGLEDGER_CONFIG";

/// Searched in order when no path is given explicitly or via the environment.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["sigledger.toml", "config/sigledger.toml"];

pub const DEFAULT_LOG_FILTER: &str = "sigledger=info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No registry owner configured")]
    MissingOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path; absent means an in-memory registry.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Attach a sink that writes every event to the tracing log.
    pub trace: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { trace: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub owner: String,
    /// Identity used for writes when none is given on the command line.
    /// Falls back to `owner`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub events: EventsConfig,
}

impl RegistryConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pick the configuration path: explicit, then `SIGLEDGER_CONFIG`, then
    /// the first default path that exists, then `sigledger.toml`.
    pub fn resolve_path(explicit: Option<&Path>, env_value: Option<String>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Some(path) = env_value.filter(|v| !v.trim().is_empty()) {
            return PathBuf::from(path);
        }
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]))
    }

    /// Resolve the path (see [`resolve_path`](Self::resolve_path)) and load it.
    pub fn discover(explicit: Option<&Path>) -> Result<(PathBuf, Self), ConfigError> {
        let path = Self::resolve_path(explicit, std::env::var(CONFIG_ENV_VAR).ok());
        let config = Self::load(&path)?;
        Ok((path, config))
    }

    pub fn owner_identity(&self) -> Result<Identity, ConfigError> {
        let owner = Identity::new(&self.owner);
        if owner.is_empty() {
            return Err(ConfigError::MissingOwner);
        }
        Ok(owner)
    }

    pub fn default_caller(&self) -> Identity {
        self.caller
            .as_deref()
            .map(Identity::new)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| Identity::new(&self.owner))
    }

    /// Non-fatal problems worth reporting to an operator.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.owner.trim().is_empty() {
            warnings.push("No owner configured; the registry cannot be opened".to_string());
        }
        if self.storage.db_path.is_none() {
            warnings.push(
                "No storage.db_path configured; writes will not survive the process".to_string(),
            );
        }
        if let Some(caller) = &self.caller {
            if !self.owner.trim().is_empty() && Identity::new(caller) != Identity::new(&self.owner)
            {
                warnings.push(format!(
                    "Default caller {} is not the owner; writes will be rejected",
                    caller
                ));
            }
        }

        warnings
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
