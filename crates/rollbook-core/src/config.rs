//! Application configuration management.
//!
//! Configuration is stored at `~/.config/rollbook/config.json` and can be
//! overridden per field from `ROLLBOOK_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "rollbook";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_ENDPOINT: &str = "https://cloud.appwrite.io/v1";
const DEFAULT_DATABASE_ID: &str = "angelicum";
const DEFAULT_COLLECTION_ID: &str = "student";
const DEFAULT_OAUTH_PROVIDER: &str = "auth0";
const DEFAULT_OAUTH_SCOPES: [&str; 3] = ["openid", "profile", "email"];

pub const ENV_ENDPOINT: &str = "ROLLBOOK_ENDPOINT";
pub const ENV_PROJECT_ID: &str = "ROLLBOOK_PROJECT_ID";
pub const ENV_DATABASE_ID: &str = "ROLLBOOK_DATABASE_ID";
pub const ENV_COLLECTION_ID: &str = "ROLLBOOK_COLLECTION_ID";
pub const ENV_APP_URL: &str = "ROLLBOOK_APP_URL";
pub const ENV_EMAIL: &str = "ROLLBOOK_EMAIL";
pub const ENV_PASSWORD: &str = "ROLLBOOK_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service API root, including the version segment
    pub endpoint: String,
    pub project_id: Option<String>,
    pub database_id: String,
    pub collection_id: String,
    /// Base URL of the web app; success and failure target of delegated login
    pub app_url: Option<String>,
    pub oauth_provider: String,
    pub oauth_scopes: Vec<String>,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project_id: None,
            database_id: DEFAULT_DATABASE_ID.to_string(),
            collection_id: DEFAULT_COLLECTION_ID.to_string(),
            app_url: None,
            oauth_provider: DEFAULT_OAUTH_PROVIDER.to_string(),
            oauth_scopes: DEFAULT_OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
            last_email: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults if absent) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Overlay values from a variable lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ENDPOINT) {
            self.endpoint = v;
        }
        if let Some(v) = get(ENV_PROJECT_ID) {
            self.project_id = Some(v);
        }
        if let Some(v) = get(ENV_DATABASE_ID) {
            self.database_id = v;
        }
        if let Some(v) = get(ENV_COLLECTION_ID) {
            self.collection_id = v;
        }
        if let Some(v) = get(ENV_APP_URL) {
            self.app_url = Some(v);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Per-project cache directory (session file, log file).
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;

        let mut path = cache_dir.join(APP_NAME);
        if let Some(ref project) = self.project_id {
            path = path.join(project);
        }
        Ok(path)
    }
}
