use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use regex::Regex;
use tracing::trace;

use crate::monitors::service::AUTO_MIN_INTERVALS;
use crate::monitors::view::ALL_VIEW;

/// Number of beat timestamps kept per service for automatic timeouts
pub const DEFAULT_BEAT_HISTORY: usize = 10;

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./pulsewatch.db")
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_beat_history")]
    pub beat_history: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            beat_history: DEFAULT_BEAT_HISTORY,
        }
    }
}

fn default_beat_history() -> usize {
    DEFAULT_BEAT_HISTORY
}

/// API server configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Optional authentication token
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Enable CORS for dashboards
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth_token: None,
            enable_cors: default_enable_cors(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_enable_cors() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub views: Vec<ViewConfig>,
}

/// A named group of services and the alerts fired when its state changes
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ViewConfig {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    Discord(Discord),
    Webhook(Webhook),
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

impl Config {
    /// Reject configurations the hub cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        // auto timeouts need AUTO_MIN_INTERVALS intervals between stored beats
        let min_history = AUTO_MIN_INTERVALS + 1;
        if self.monitor.beat_history < min_history {
            bail!(
                "monitor.beat_history must be at least {} (got {})",
                min_history,
                self.monitor.beat_history
            );
        }

        let mut seen = HashSet::new();
        for view in &self.views {
            if !seen.insert(view.name.as_str()) {
                bail!("view '{}' is configured twice", view.name);
            }
            if view.name == ALL_VIEW && !view.pattern.is_empty() {
                bail!("the '{ALL_VIEW}' view always matches every service and takes no pattern");
            }
            Regex::new(&view.pattern)
                .with_context(|| format!("view '{}' has an invalid pattern", view.name))?;
        }

        Ok(())
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read configuration file '{path}'"))?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
