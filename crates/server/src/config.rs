//! # Application Configuration
//!
//! Loads the server configuration from an optional `config.yml` and the
//! environment. Top-level keys map to plain variables (`PORT`, `PROJECT_ID`,
//! `SECRET_ID`, `SECRET_VERSION`); nested keys are overridden with
//! `ADS_UPLOADER_` variables such as `ADS_UPLOADER_GOOGLE_ADS__API_VERSION`.

use ads_uploader::providers::{
    google_ads::GoogleAdsConfig,
    secret_manager::{METADATA_TOKEN_URL, SECRET_MANAGER_URL},
};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use tracing::info;

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates a required configuration file was not found.
    NotFound(String),
    /// A required setting was not provided. Holds the environment variable name.
    Missing(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
            ConfigError::Missing(var) => write!(f, "Missing required setting: {var}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// Where the server reads its Google Ads credentials from.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SecretManagerConfig {
    #[serde(default = "default_secret_manager_url")]
    pub api_url: String,
    /// A pre-issued bearer token. When absent the metadata server is asked.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_metadata_token_url")]
    pub metadata_token_url: String,
}

impl Default for SecretManagerConfig {
    fn default() -> Self {
        Self {
            api_url: default_secret_manager_url(),
            access_token: None,
            metadata_token_url: default_metadata_token_url(),
        }
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT` env var.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The project holding the credential secret. Loaded from `PROJECT_ID`.
    #[serde(default = "default_project_id")]
    pub project_id: String,
    /// The credential secret's name. Loaded from `SECRET_ID`.
    #[serde(default)]
    pub secret_id: String,
    #[serde(default = "default_secret_version")]
    pub secret_version: String,
    #[serde(default)]
    pub google_ads: GoogleAdsConfig,
    #[serde(default)]
    pub secret_manager: SecretManagerConfig,
}

fn default_port() -> u16 {
    8080
}

fn default_project_id() -> String {
    "ads-conversion-uploader".to_string()
}

fn default_secret_version() -> String {
    "latest".to_string()
}

fn default_secret_manager_url() -> String {
    SECRET_MANAGER_URL.to_string()
}

fn default_metadata_token_url() -> String {
    METADATA_TOKEN_URL.to_string()
}

// Helper to read a file, substitute env vars, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(e.to_string()))?;
    let expanded_content = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded_content.to_string()))
}

/// Loads the application configuration from a file and environment variables.
///
/// With an explicit path the file must exist. Without one, `config.yml` next
/// to the crate manifest is used when present and the environment alone
/// otherwise.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    if let Some(path) = config_path_override {
        let content = read_and_substitute(path)?
            .ok_or_else(|| ConfigError::NotFound(format!("Config file not found at '{path}'.")))?;
        info!("Loading configuration from '{path}'.");
        builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
    } else {
        let default_path = format!("{}/config.yml", env!("CARGO_MANIFEST_DIR"));
        if let Some(content) = read_and_substitute(&default_path)? {
            info!("Loading configuration from '{default_path}'.");
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
    }

    let settings = builder
        // Top-level keys like PORT and SECRET_ID.
        .add_source(Environment::default())
        // Nested overrides, e.g. ADS_UPLOADER_SECRET_MANAGER__ACCESS_TOKEN.
        .add_source(
            Environment::with_prefix("ADS_UPLOADER")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let mut config: AppConfig = settings.try_deserialize()?;

    if config.secret_id.trim().is_empty() {
        return Err(ConfigError::Missing("SECRET_ID".to_string()));
    }
    // `${VAR}` substitution leaves an empty string behind for unset variables.
    config.secret_manager.access_token = config
        .secret_manager
        .access_token
        .filter(|token| !token.trim().is_empty());

    Ok(config)
}
