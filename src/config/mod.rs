//! Configuration management for catalog-mirror.
//!
//! Configuration is read from `~/.config/catalog-mirror/config.toml` at
//! startup. If the file doesn't exist, a default configuration with comments
//! is created. Credentials may instead come from the environment
//! (`CATALOG_API_ID`, `CATALOG_AFFILIATE_ID`, `CATALOG_ADMIN_TOKEN`).

use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::fetcher::FetchPolicy;

pub const ENV_API_ID: &str = "CATALOG_API_ID";
pub const ENV_AFFILIATE_ID: &str = "CATALOG_AFFILIATE_ID";
pub const ENV_ADMIN_TOKEN: &str = "CATALOG_ADMIN_TOKEN";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub ingest: IngestSettings,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Defaults to `<data_dir>/catalog-mirror/catalog.db`.
    pub path: Option<PathBuf>,
}

/// Provider endpoint, credentials and the fixed query defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_id: String,
    pub affiliate_id: String,
    pub site: String,
    pub service: String,
    pub floor: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.dmm.com/affiliate/v3/ItemList".to_string(),
            api_id: String::new(),
            affiliate_id: String::new(),
            site: "FANZA".to_string(),
            service: "digital".to_string(),
            floor: "videoa".to_string(),
            timeout_secs: 30,
            max_retries: 2,
            backoff_ms: 500,
        }
    }
}

impl ProviderConfig {
    pub fn has_credentials(&self) -> bool {
        !self.api_id.trim().is_empty() && !self.affiliate_id.trim().is_empty()
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

/// Operator-chosen ingestion parameters, used when a run doesn't override them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Items per provider request.
    pub hits: i64,
    /// 1-based provider offset of the first request.
    pub offset: i64,
    /// Items to ingest per run.
    pub total: i64,
    pub sort: String,
    pub keyword: Option<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            hits: 20,
            offset: 1,
            total: 100,
            sort: "date".to_string(),
            keyword: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Bearer token for `/admin` routes. Admin routes refuse every request
    /// while this is unset.
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            admin_token: None,
        }
    }
}

impl Config {
    /// Load configuration from the default path, then apply environment
    /// overrides.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            let mut config = Self::default();
            config.apply_env(|key| std::env::var(key).ok());
            return Ok(config);
        }

        Self::from_path(&config_path)
    }

    /// Load from an explicit path. The file must exist.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Get the default config file path: `~/.config/catalog-mirror/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("catalog-mirror").join("config.toml"))
    }

    /// Overwrite credentials with non-empty values from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(api_id) = non_empty(ENV_API_ID) {
            self.provider.api_id = api_id;
        }
        if let Some(affiliate_id) = non_empty(ENV_AFFILIATE_ID) {
            self.provider.affiliate_id = affiliate_id;
        }
        if let Some(token) = non_empty(ENV_ADMIN_TOKEN) {
            self.server.admin_token = Some(token);
        }
    }

    /// The configured admin token, ignoring blank values.
    pub fn admin_token(&self) -> Option<&str> {
        self.server
            .admin_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        tracing::info!(path = %path.display(), "Created default config file");
        Ok(())
    }

    fn default_config_content() -> String {
        r##"# catalog-mirror configuration
#
# Credentials can also be supplied through the environment:
#   CATALOG_API_ID, CATALOG_AFFILIATE_ID, CATALOG_ADMIN_TOKEN

[database]
# SQLite file; defaults to <data_dir>/catalog-mirror/catalog.db
# path = "/var/lib/catalog-mirror/catalog.db"

[provider]
endpoint = "https://api.dmm.com/affiliate/v3/ItemList"
api_id = ""
affiliate_id = ""
site = "FANZA"
service = "digital"
floor = "videoa"

# Per-attempt timeout and retry budget
timeout_secs = 30
max_retries = 2
backoff_ms = 500

[ingest]
# Items per request (at most 100)
hits = 20
# 1-based offset of the first request
offset = 1
# Items per run (at most 1000)
total = 100
sort = "date"
# keyword = "drama"

[server]
bind = "127.0.0.1:8080"
# Required for POST /admin/fetch-items
# admin_token = ""
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
