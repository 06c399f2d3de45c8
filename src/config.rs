//! Configuration management for quotesync.
//!
//! This module handles loading and saving application configuration to/from
//! a JSON file. The config directory can be customized.
//!
//! Includes sync-related configuration:
//! - remote_url: base URL of the remote quote source
//! - interval_secs: how often the scheduler runs a reconcile cycle
//! - request_timeout_secs: HTTP request timeout
//! - server_port: loopback port of the simulated quote server

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QuoteError, QuoteResult};

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Port for the simulated quote server
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

fn default_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_server_port() -> u16 {
    8385
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            remote_url: None,
            interval_secs: default_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            server_port: default_server_port(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigData {
    /// Path to the database file
    #[serde(default)]
    pub database_file: String,
    /// Sync configuration
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            database_file: String::new(),
            sync: SyncConfig::default(),
        }
    }
}

/// Configuration manager
pub struct Config {
    config_dir: PathBuf,
    config_file: PathBuf,
    data: ConfigData,
}

impl Config {
    /// Create a new configuration manager
    ///
    /// Without the `desktop` feature, `config_dir` is required.
    pub fn new(config_dir: Option<PathBuf>) -> QuoteResult<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => {
                #[cfg(feature = "desktop")]
                {
                    dirs::config_dir()
                        .unwrap_or_else(|| PathBuf::from("."))
                        .join("quotesync")
                }
                #[cfg(not(feature = "desktop"))]
                {
                    return Err(QuoteError::Config(
                        "config_dir is required without the desktop feature".to_string(),
                    ));
                }
            }
        };

        fs::create_dir_all(&config_dir)?;
        let config_file = config_dir.join("config.json");
        let default_db = config_dir.join("quotes.db").to_string_lossy().to_string();

        let mut data = fs::read_to_string(&config_file)
            .ok()
            .and_then(|content| match serde_json::from_str::<ConfigData>(&content) {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::warn!("Ignoring malformed config {}: {}", config_file.display(), e);
                    None
                }
            })
            .unwrap_or_default();
        if data.database_file.is_empty() {
            data.database_file = default_db;
        }

        let config = Self {
            config_dir,
            config_file,
            data,
        };

        // Save default config if it doesn't exist
        if !config.config_file.exists() {
            config.save()?;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> QuoteResult<()> {
        let content = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.config_file, content)?;
        Ok(())
    }

    pub fn data(&self) -> &ConfigData {
        &self.data
    }

    /// Get the configuration directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the database file path
    pub fn database_file(&self) -> &str {
        &self.data.database_file
    }

    /// Check if sync is enabled
    pub fn is_sync_enabled(&self) -> bool {
        self.data.sync.enabled
    }

    pub fn set_sync_enabled(&mut self, enabled: bool) -> QuoteResult<()> {
        self.data.sync.enabled = enabled;
        self.save()
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.data.sync.remote_url.as_deref()
    }

    /// Set the remote URL. Only http(s) URLs are accepted.
    pub fn set_remote_url(&mut self, url: Option<&str>) -> QuoteResult<()> {
        if let Some(url) = url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(QuoteError::validation(
                    "remote_url",
                    "must start with http:// or https://",
                ));
            }
        }
        self.data.sync.remote_url = url.map(String::from);
        self.save()
    }

    /// Interval between scheduled sync cycles
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.data.sync.interval_secs)
    }

    pub fn set_sync_interval_secs(&mut self, secs: u64) -> QuoteResult<()> {
        if secs == 0 {
            return Err(QuoteError::validation("interval_secs", "must be at least 1"));
        }
        self.data.sync.interval_secs = secs;
        self.save()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.data.sync.request_timeout_secs)
    }

    pub fn server_port(&self) -> u16 {
        self.data.sync.server_port
    }

    pub fn set_server_port(&mut self, port: u16) -> QuoteResult<()> {
        self.data.sync.server_port = port;
        self.save()
    }
}
