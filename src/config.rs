//! Client Configuration
//!
//! Loaded from a JSON file or from `ORG_TREE_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::Endpoint;
use crate::error::ConfigError;

pub const ENV_BASE_URL: &str = "ORG_TREE_API_BASE_URL";
pub const ENV_PAGE_SIZE: &str = "ORG_TREE_PAGE_SIZE";
pub const ENV_PERSIST_MOVES: &str = "ORG_TREE_PERSIST_MOVES";
pub const ENV_LOG_DIR: &str = "ORG_TREE_LOG_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeConfig {
    #[serde(default = "default_base_url")]
    pub api_base_url: String,
    /// Resource used when a call does not name one
    #[serde(default)]
    pub endpoint: Endpoint,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Total root count used for page math
    #[serde(default = "default_total_items")]
    pub total_items: u32,
    #[serde(default = "default_notification_timeout_ms")]
    pub notification_timeout_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Send relocations to the server instead of keeping them client-side
    #[serde(default)]
    pub persist_moves: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_total_items() -> u32 {
    20
}

fn default_notification_timeout_ms() -> u64 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            endpoint: Endpoint::default(),
            page_size: default_page_size(),
            total_items: default_total_items(),
            notification_timeout_ms: default_notification_timeout_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            persist_moves: false,
            log_dir: default_log_dir(),
        }
    }
}

impl TreeConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: TreeConfig = serde_json::from_str(&text)?;
        config.validated()
    }

    /// Defaults overridden by whatever `ORG_TREE_*` variables are set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL) {
            config.api_base_url = url;
        }
        if let Some(size) = lookup(ENV_PAGE_SIZE) {
            config.page_size = size.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_PAGE_SIZE,
                value: size.clone(),
            })?;
        }
        if let Some(flag) = lookup(ENV_PERSIST_MOVES) {
            config.persist_moves = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_PERSIST_MOVES,
                        value: flag,
                    })
                }
            };
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            config.log_dir = PathBuf::from(dir);
        }
        config.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pageSize",
                value: "0".to_string(),
            });
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "apiBaseUrl",
                value: self.api_base_url,
            });
        }
        Ok(self)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
