//! Configuration management for rangeup

use crate::drive::ConflictBehavior;
use crate::error::{Error, Result};
use crate::task::{validate_range_size, UploadTaskOptions, DEFAULT_RANGE_SIZE};
use crate::transport::HttpTransport;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration directory name
const CONFIG_DIR: &str = "rangeup";

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    pub logging: Option<LoggingConfig>,
}

/// Storage service endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    // Ready-made bearer token; acquiring one is up to the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
        }
    }
}

/// Upload tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Slice size in bytes (multiple of 327680)
    #[serde(default = "default_range_size")]
    pub range_size: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    /// Request timeout, in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub conflict_behavior: ConflictBehavior,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            range_size: default_range_size(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            timeout: default_timeout(),
            conflict_behavior: ConflictBehavior::default(),
        }
    }
}

impl UploadConfig {
    /// Task options carrying these settings, without callbacks
    pub fn task_options(&self) -> UploadTaskOptions {
        UploadTaskOptions::new()
            .with_range_size(self.range_size)
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_millis(self.retry_delay))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl ConfigFile {
    /// HTTP transport using the configured timeout and access token
    pub fn http_transport(&self) -> Result<HttpTransport> {
        let transport = HttpTransport::new(Duration::from_secs(self.upload.timeout))?;
        Ok(match &self.service.access_token {
            Some(token) => transport.with_access_token(token.clone()),
            None => transport,
        })
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            upload: UploadConfig::default(),
            logging: None,
        }
    }
}

// Default values
fn default_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_range_size() -> u64 {
    DEFAULT_RANGE_SIZE
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000 // 1 second
}

fn default_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let home = home_dir().ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
    let config_dir = home.join(".config").join(CONFIG_DIR);

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir).map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
    }

    Ok(config_dir)
}

/// Get the configuration file path
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Load configuration from the default location
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&get_config_path()?)
}

/// Load configuration from `path`
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        Error::InvalidConfig(format!("Failed to read config file: {}", e))
    })?;

    let config: ConfigFile = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to the default location
pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(config, &get_config_path()?)
}

/// Save configuration to `path`
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;

    fs::write(path, content).map_err(|e| {
        Error::Config(format!("Failed to write config file: {}", e))
    })?;

    // The file may hold an access token: owner read/write only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &ConfigFile) -> Result<()> {
    if config.service.base_url.is_empty() {
        return Err(Error::InvalidInput("Service base URL cannot be empty".to_string()));
    }

    if !config.service.base_url.starts_with("https://") && !config.service.base_url.starts_with("http://") {
        return Err(Error::InvalidInput(format!(
            "Service base URL must be http(s): {}",
            config.service.base_url
        )));
    }

    if matches!(&config.service.access_token, Some(token) if token.trim().is_empty()) {
        return Err(Error::Config("access_token is set but empty".to_string()));
    }

    validate_range_size(config.upload.range_size)?;

    if config.upload.max_retries > 10 {
        return Err(Error::InvalidInput(format!(
            "max_retries cannot exceed 10, got {}",
            config.upload.max_retries
        )));
    }

    if config.upload.timeout == 0 {
        return Err(Error::InvalidInput("Timeout must be at least 1 second".to_string()));
    }

    Ok(())
}

/// Check if configuration exists
pub fn config_exists() -> bool {
    get_config_path().map(|p| p.exists()).unwrap_or(false)
}

/// Public alias for ConfigFile (used by lib.rs)
pub use ConfigFile as Config;
