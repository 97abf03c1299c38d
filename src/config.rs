use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;

pub const CONFIG_FILE: &str = "config.json";

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("smarttask")
}

fn default_server_url() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_api_prefix() -> String {
    "/api/v1".into()
}

fn default_timeout() -> u64 {
    10
}

fn default_debounce() -> u64 {
    500
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_debounce")]
    pub parse_debounce_ms: u64,
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_prefix: default_api_prefix(),
            request_timeout_secs: default_timeout(),
            parse_debounce_ms: default_debounce(),
            debug_logging: false,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        default_config_dir().join(CONFIG_FILE)
    }

    /// Read the config file at `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| SyncError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Default location plus `SMARTTASK_URL` / `SMARTTASK_DEBUG` overrides.
    pub fn load() -> Result<Self, SyncError> {
        let mut config = Self::load_from(&Self::default_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("SMARTTASK_URL").filter(|u| !u.trim().is_empty()) {
            self.server_url = url.trim().to_string();
        }
        if let Some(flag) = var("SMARTTASK_DEBUG") {
            self.debug_logging = matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }
    }

    /// Server URL joined with the API prefix, without a trailing slash.
    pub fn api_base(&self) -> String {
        let url = self.server_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            url.to_string()
        } else {
            format!("{}/{}", url, prefix)
        }
    }

    pub fn parse_debounce(&self) -> Duration {
        Duration::from_millis(self.parse_debounce_ms)
    }
}
