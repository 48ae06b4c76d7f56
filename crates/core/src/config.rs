//! Configuration management
//!
//! Settings are plain data handed to a backend's `connect`. They can come from
//! a TOML file, from the environment, or both (environment wins).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryConfig;

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "eu-central-1";

pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ENDPOINT: &str = "AWS_S3_ENDPOINT";
pub const ENV_NO_SSL: &str = "AWS_S3_NO_SSL";
pub const ENV_FORCE_PATH_STYLE: &str = "AWS_S3_FORCE_PATH_STYLE";

/// Overrides the directory holding `config.toml`
pub const ENV_CONFIG_DIR: &str = "SKIFF_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retry: RetryConfig,
    pub s3: S3Settings,
}

impl Config {
    /// Overlay environment variables on top of the file settings
    pub fn apply_env(self) -> Result<Self> {
        self.apply_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::apply_env`] with an explicit variable lookup
    pub fn apply_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.s3 = self.s3.apply_lookup(lookup)?;
        Ok(self)
    }
}

/// Connection settings for an S3-compatible service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    pub region: String,
    /// Custom endpoint; when unset the endpoint is derived from the region
    pub endpoint: Option<String>,
    pub disable_ssl: bool,
    /// Path-style (`host/bucket/key`) instead of virtual-hosted-style addressing
    pub force_path_style: bool,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            disable_ssl: false,
            force_path_style: false,
        }
    }
}

impl S3Settings {
    /// Build settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().apply_lookup(|name| std::env::var(name).ok())
    }

    /// Apply `AWS_REGION`, `AWS_S3_ENDPOINT`, `AWS_S3_NO_SSL` and
    /// `AWS_S3_FORCE_PATH_STYLE`. Unset or empty variables leave the current
    /// value alone.
    pub fn apply_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(region) = get(ENV_REGION) {
            self.region = region;
        }
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            self.endpoint = Some(endpoint);
        }
        if let Some(flag) = get(ENV_NO_SSL) {
            self.disable_ssl = parse_bool(ENV_NO_SSL, &flag)?;
        }
        if let Some(flag) = get(ENV_FORCE_PATH_STYLE) {
            self.force_path_style = parse_bool(ENV_FORCE_PATH_STYLE, &flag)?;
        }

        Ok(self)
    }
}

/// Parse a boolean flag the way `1`, `t`, `true`, `0`, `f`, `false` and their
/// capitalized forms are commonly written in environment variables.
pub fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(Error::Config(format!(
            "{name}: expected a boolean, got '{value}'"
        ))),
    }
}

/// Loads and saves the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Use `$SKIFF_CONFIG_DIR/config.toml`, falling back to the platform
    /// config directory (`~/.config/skiff/config.toml` on Linux)
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(ENV_CONFIG_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Cannot determine config directory".into()))?
                .join("skiff"),
        };

        Ok(Self::with_path(dir.join(CONFIG_FILE)))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file, or return defaults when it does not exist
    pub fn load(&self) -> Result<Config> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                tracing::debug!(path = %self.path.display(), "Loaded config file");
                Ok(toml::from_str(&content)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No config file, using defaults");
                Ok(Config::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
