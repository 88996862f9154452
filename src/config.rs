//! Backend selection and connection settings.
//!
//! Settings come from `~/.config/nested-todos/config.json` when present and are
//! then overridden by environment variables:
//! - `NESTED_TODOS_BACKEND` - `local` (default) or `remote`
//! - `NESTED_TODOS_URL` - base URL of the list server, required for `remote`
//! - `NESTED_TODOS_DATA_DIR` - directory holding the local record

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{LocalStore, RemoteStore, TodoStore};

const APP_NAME: &str = "nested-todos";
const CONFIG_FILE: &str = "config.json";

pub const ENV_BACKEND: &str = "NESTED_TODOS_BACKEND";
pub const ENV_URL: &str = "NESTED_TODOS_URL";
pub const ENV_DATA_DIR: &str = "NESTED_TODOS_DATA_DIR";

/// Missing or unusable connection settings for a backend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("remote backend selected but no server URL configured (set NESTED_TODOS_URL)")]
    MissingRemoteUrl,

    #[error("invalid remote URL `{url}`: {reason}")]
    InvalidRemoteUrl { url: String, reason: String },

    #[error("could not determine a data directory for the local store")]
    NoDataDir,
}

/// Which persistence backend the engine talks to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Local,
    Remote,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown backend `{}` (expected local or remote)", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    /// Base URL of the list server, e.g. `http://localhost:3001`.
    pub remote_url: Option<String>,
    /// Directory of the local record. Defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load the config file, then apply environment overrides.
    /// A missing or unreadable file falls back to defaults.
    pub fn load() -> Self {
        let config = match Self::try_load_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    fn try_load_file() -> Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Overlay values from `lookup` (normally the process environment).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(backend) = lookup(ENV_BACKEND) {
            match backend.parse() {
                Ok(backend) => self.backend = backend,
                Err(e) => tracing::warn!("Ignoring {}: {}", ENV_BACKEND, e),
            }
        }
        if let Some(url) = lookup(ENV_URL).filter(|url| !url.trim().is_empty()) {
            self.remote_url = Some(url);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|dir| !dir.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or(ConfigError::NoDataDir)
    }

    pub fn local_store(&self) -> Result<LocalStore, ConfigError> {
        Ok(LocalStore::new(self.data_dir()?))
    }

    pub fn remote_store(&self) -> Result<RemoteStore, ConfigError> {
        let url = self
            .remote_url
            .as_deref()
            .ok_or(ConfigError::MissingRemoteUrl)?;
        RemoteStore::new(url)
    }

    /// Build the configured backend.
    pub fn build_store(&self) -> Result<Arc<dyn TodoStore>, ConfigError> {
        let store: Arc<dyn TodoStore> = match self.backend {
            Backend::Local => Arc::new(self.local_store()?),
            Backend::Remote => Arc::new(self.remote_store()?),
        };
        Ok(store)
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
