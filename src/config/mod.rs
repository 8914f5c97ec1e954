//! Configuration management
//!
//! This module handles loading and parsing configuration for the blogdesk client core.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Persisted session storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Resource cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Upload validation configuration
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_base_url() -> String {
    "https://localhost:7134/api/v1".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Persisted session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage driver (memory or file)
    #[serde(default)]
    pub driver: StorageDriver,
    /// Path of the storage file (file driver only)
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: StorageDriver::default(),
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/session.json")
}

/// Storage driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    /// Process-local storage, lost on exit
    Memory,
    /// JSON file on disk (default)
    #[default]
    File,
}

/// Resource cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries per resource cache
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum file size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(mime_type))
    }

    /// Human readable list of allowed formats, e.g. "JPG, PNG, GIF, or WEBP"
    pub fn describe_allowed(&self) -> String {
        let names: Vec<String> = self
            .allowed_types
            .iter()
            .map(|t| match t.as_str() {
                "image/jpeg" => "JPG".to_string(),
                other => other.rsplit('/').next().unwrap_or(other).to_uppercase(),
            })
            .collect();
        match names.len() {
            0 => "nothing".to_string(),
            1 => names[0].clone(),
            n => format!("{}, or {}", names[..n - 1].join(", "), names[n - 1]),
        }
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - BLOGDESK_API_BASE_URL
    /// - BLOGDESK_API_TIMEOUT_SECONDS
    /// - BLOGDESK_STORAGE_DRIVER
    /// - BLOGDESK_STORAGE_PATH
    /// - BLOGDESK_CACHE_MAX_CAPACITY
    /// - BLOGDESK_UPLOAD_MAX_FILE_SIZE
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        if self.cache.max_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("BLOGDESK_API_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Ok(timeout) = std::env::var("BLOGDESK_API_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.api.timeout_seconds = timeout;
            }
        }

        if let Ok(driver) = std::env::var("BLOGDESK_STORAGE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "memory" => self.storage.driver = StorageDriver::Memory,
                "file" => self.storage.driver = StorageDriver::File,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(path) = std::env::var("BLOGDESK_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        if let Ok(capacity) = std::env::var("BLOGDESK_CACHE_MAX_CAPACITY") {
            if let Ok(capacity) = capacity.parse::<u64>() {
                self.cache.max_capacity = capacity;
            }
        }

        if let Ok(size) = std::env::var("BLOGDESK_UPLOAD_MAX_FILE_SIZE") {
            if let Ok(size) = size.parse::<u64>() {
                self.upload.max_file_size = size;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "BLOGDESK_API_BASE_URL",
    "BLOGDESK_API_TIMEOUT_SECONDS",
    "BLOGDESK_STORAGE_DRIVER",
    "BLOGDESK_STORAGE_PATH",
    "BLOGDESK_CACHE_MAX_CAPACITY",
    "BLOGDESK_UPLOAD_MAX_FILE_SIZE",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}
