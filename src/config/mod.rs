//! Configuration management.
//!
//! flowctl configuration can come from:
//! - Config file (`--config`, `./flowctl.toml` or ~/.config/flowctl/config.toml)
//! - Environment variables (FLOWCTL_*)
//! - CLI flags, applied by the binary after loading
//!
//! The struct is built once at startup. Commands ask it for a validated
//! [`Target`] and fail before doing any work when one is missing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// flowctl configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instance that export/import talk to
    #[serde(default)]
    pub instance: InstanceConfig,

    /// Staging instance used by the integration test
    #[serde(default)]
    pub test_instance: InstanceConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Directory holding one JSON file per workflow
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: PathBuf,

    /// Perform all local work but never touch the network
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance: InstanceConfig::default(),
            test_instance: InstanceConfig::default(),
            http: HttpConfig::default(),
            workflows_dir: default_workflows_dir(),
            dry_run: false,
        }
    }
}

fn default_workflows_dir() -> PathBuf {
    PathBuf::from("workflows")
}

/// Connection settings for one remote instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Base URL, e.g. https://n8n.example.com
    #[serde(default)]
    pub base_url: Option<String>,

    /// Value sent in the API key header
    #[serde(default)]
    pub api_key: Option<String>,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Connect timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Which configured instance a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instance {
    Primary,
    Test,
}

impl Instance {
    fn url_var(&self) -> &'static str {
        match self {
            Instance::Primary => "FLOWCTL_BASE_URL",
            Instance::Test => "FLOWCTL_TEST_BASE_URL",
        }
    }

    fn key_var(&self) -> &'static str {
        match self {
            Instance::Primary => "FLOWCTL_API_KEY",
            Instance::Test => "FLOWCTL_TEST_API_KEY",
        }
    }
}

/// A fully specified remote instance.
#[derive(Clone)]
pub struct Target {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl Config {
    /// Load configuration from the default locations plus the environment.
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from an explicit file, then apply the environment.
    ///
    /// Unlike [`Config::load`], a missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Get the config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("flowctl"))
            .unwrap_or_else(|| PathBuf::from(".flowctl"))
    }

    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from("flowctl.toml");
        if local.is_file() {
            return Some(local);
        }
        let global = Self::config_dir().join("config.toml");
        global.is_file().then_some(global)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{} in {}", e, path.display())))
    }

    /// Parse a TOML document into a config.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Overlay values from an environment lookup.
    ///
    /// Empty values are treated as unset. Values that fail to parse are
    /// configuration errors rather than silently ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("FLOWCTL_BASE_URL") {
            self.instance.base_url = Some(url);
        }
        if let Some(key) = get("FLOWCTL_API_KEY") {
            self.instance.api_key = Some(key);
        }
        if let Some(url) = get("FLOWCTL_TEST_BASE_URL") {
            self.test_instance.base_url = Some(url);
        }
        if let Some(key) = get("FLOWCTL_TEST_API_KEY") {
            self.test_instance.api_key = Some(key);
        }
        if let Some(dir) = get("FLOWCTL_WORKFLOWS_DIR") {
            self.workflows_dir = PathBuf::from(dir);
        }
        if let Some(flag) = get("FLOWCTL_DRY_RUN") {
            self.dry_run = parse_bool("FLOWCTL_DRY_RUN", &flag)?;
        }
        if let Some(secs) = get("FLOWCTL_TIMEOUT_SECONDS") {
            self.http.timeout_seconds = parse_secs("FLOWCTL_TIMEOUT_SECONDS", &secs)?;
        }
        if let Some(secs) = get("FLOWCTL_CONNECT_TIMEOUT_SECONDS") {
            self.http.connect_timeout_seconds =
                parse_secs("FLOWCTL_CONNECT_TIMEOUT_SECONDS", &secs)?;
        }
        Ok(())
    }

    /// Resolve and validate the connection settings for an instance.
    pub fn target(&self, instance: Instance) -> Result<Target> {
        let section = match instance {
            Instance::Primary => &self.instance,
            Instance::Test => &self.test_instance,
        };

        let base_url = section
            .base_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", instance.url_var())))?;

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "{} must start with http:// or https:// (got '{}')",
                instance.url_var(),
                base_url
            )));
        }

        let api_key = section
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", instance.key_var())))?;

        Ok(Target {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be a boolean (got '{}')",
            name, other
        ))),
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|s| *s > 0)
        .ok_or_else(|| {
            Error::Config(format!(
                "{} must be a positive number of seconds (got '{}')",
                name, value
            ))
        })
}
