// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration.
//!
//! Configuration is read from a TOML file (by default
//! `<config dir>/catalog-sync/config.toml`). Every key is optional:
//! - `endpoint`: URL submissions are POSTed to
//! - `data_dir`: where the backlog lives
//! - `max_concurrent_uploads`: uploads in flight during a drain
//! - `request_timeout_secs`: per-upload timeout
//! - `probe_addr`, `probe_interval_ms`, `probe_timeout_ms`: reachability probing

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::orchestrator::DEFAULT_MAX_CONCURRENT_UPLOADS;

const APP_DIR_NAME: &str = "catalog-sync";
const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_ENDPOINT: &str = "https://app.getswipe.in/api/public/add";
pub const DEFAULT_PROBE_ADDR: &str = "app.getswipe.in:443";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Settings for the upload client, the backlog, and connectivity probing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// `host:port` opened by the TCP reachability probe.
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".catalog-sync"))
}

fn default_max_concurrent_uploads() -> usize {
    DEFAULT_MAX_CONCURRENT_UPLOADS
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_probe_addr() -> String {
    DEFAULT_PROBE_ADDR.to_string()
}

fn default_probe_interval_ms() -> u64 {
    5_000
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: default_endpoint(),
            data_dir: default_data_dir(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
            request_timeout_secs: default_request_timeout_secs(),
            probe_addr: default_probe_addr(),
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject settings the sync engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_uploads == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_uploads must be at least 1".to_string(),
            ));
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "invalid endpoint '{}': must start with http:// or https://",
                self.endpoint
            )));
        }
        if self.probe_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "probe_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Default location of the config file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
