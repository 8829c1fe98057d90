//! Top-level library configuration.
//!
//! Configuration is stored in `.helpdesk/config.yaml` (or under
//! `$HELPDESK_ROOT`) and includes:
//! - Ticket service location and request limits
//! - Credential lookup keys, in precedence order
//! - The SLA policy applied to tickets the service sends without one

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DeskError, Result};
use crate::types::TicketPriority;

/// Environment variable overriding the configuration directory.
pub const ROOT_ENV: &str = "HELPDESK_ROOT";

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "HELPDESK_API_URL";

/// Returns the configuration directory.
pub fn helpdesk_root() -> PathBuf {
    match env::var(ROOT_ENV) {
        Ok(root) if !root.is_empty() => PathBuf::from(root),
        _ => PathBuf::from(".helpdesk"),
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub credentials: CredentialConfig,

    #[serde(default)]
    pub sla: SlaPolicy,
}

/// Ticket service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on concurrent writes during a bulk commit (default: 5)
    #[serde(default = "default_max_concurrent_writes")]
    pub max_concurrent_writes: usize,
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_writes() -> usize {
    5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_concurrent_writes: default_max_concurrent_writes(),
        }
    }
}

/// Where the principal's token may be stored. Earlier keys win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default = "default_credential_keys")]
    pub keys: Vec<String>,
}

fn default_credential_keys() -> Vec<String> {
    vec!["token".to_string(), "auth_token".to_string()]
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            keys: default_credential_keys(),
        }
    }
}

/// Resolution targets in hours, per priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaPolicy {
    #[serde(default = "default_critical_hours")]
    pub critical_hours: i64,
    #[serde(default = "default_high_hours")]
    pub high_hours: i64,
    #[serde(default = "default_medium_hours")]
    pub medium_hours: i64,
    #[serde(default = "default_low_hours")]
    pub low_hours: i64,
}

fn default_critical_hours() -> i64 {
    4
}

fn default_high_hours() -> i64 {
    8
}

fn default_medium_hours() -> i64 {
    24
}

fn default_low_hours() -> i64 {
    72
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            critical_hours: default_critical_hours(),
            high_hours: default_high_hours(),
            medium_hours: default_medium_hours(),
            low_hours: default_low_hours(),
        }
    }
}

impl SlaPolicy {
    pub fn window_for(&self, priority: TicketPriority) -> SignedDuration {
        let hours = match priority {
            TicketPriority::Critical => self.critical_hours,
            TicketPriority::High => self.high_hours,
            TicketPriority::Medium => self.medium_hours,
            TicketPriority::Low => self.low_hours,
        };
        SignedDuration::from_hours(hours)
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        helpdesk_root().join("config.yaml")
    }

    /// Load configuration from the default location, or return defaults if
    /// no file exists. `HELPDESK_API_URL` overrides the stored base URL.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        if let Ok(url) = env::var(API_URL_ENV)
            && !url.is_empty()
        {
            config.api.base_url = url;
            config.validate()?;
        }
        Ok(config)
    }

    /// Load configuration from a specific file, or defaults if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            DeskError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config at {}: {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_yaml_ng::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                DeskError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create directory for config at {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).map_err(|e| {
            DeskError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write config at {}: {}", path.display(), e),
            ))
        })?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.base_url()?;
        if self.api.max_concurrent_writes == 0 {
            return Err(DeskError::Config(
                "api.max_concurrent_writes must be at least 1".to_string(),
            ));
        }
        if self.credentials.keys.is_empty() {
            return Err(DeskError::Config(
                "credentials.keys must name at least one key".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed service base URL, always ending in `/` so endpoint paths join
    /// beneath it.
    pub fn base_url(&self) -> Result<Url> {
        let raw = self.api.base_url.trim();
        let with_slash = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        Url::parse(&with_slash)
            .map_err(|e| DeskError::Config(format!("invalid api.base_url '{raw}': {e}")))
    }

    /// Get the request timeout duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}
