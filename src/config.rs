use crate::api::DEFAULT_API_BASE_URL;
use crate::models::ParseTier;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_URL: &str = "TWEETCHART_API_URL";

const APP_DIR: &str = "tweetchart";
const CONFIG_FILE: &str = "config.toml";
const CREDENTIAL_FILE: &str = "credentials.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub credential_file: Option<PathBuf>,
    pub default_tier: ParseTier,
    pub enable_chart_parsing: bool,
    pub x_bearer_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            credential_file: None,
            default_tier: ParseTier::default(),
            enable_chart_parsing: true,
            x_bearer_token: None,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load from `path`, or the default location when `None`. A missing file
    /// yields defaults. `TWEETCHART_API_URL` wins over the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(),
        };

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                config.api_base_url = url.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn credential_path(&self) -> Result<PathBuf> {
        match &self.credential_file {
            Some(path) => Ok(path.clone()),
            None => app_dir()
                .map(|dir| dir.join(CREDENTIAL_FILE))
                .context("Could not determine a config directory for the credential store"),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

pub fn default_config_path() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join(CONFIG_FILE))
}
