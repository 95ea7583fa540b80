//! Configuration module for Cumulus.

use serde::Deserialize;
use std::path::Path;

use crate::{CumulusError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Base URL of the single-page client, used to build public links.
    #[serde(default = "default_client_url")]
    pub client_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_client_url() -> String {
    "http://localhost:5173".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            client_url: default_client_url(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/cumulus.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// JWT secret key (must be set).
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token expiry in seconds.
    #[serde(default = "default_jwt_access_expiry")]
    pub jwt_access_token_expiry_secs: u64,
    /// Refresh token expiry in days.
    #[serde(default = "default_jwt_refresh_expiry")]
    pub jwt_refresh_token_expiry_days: u64,
    /// Mark the refresh cookie `Secure` (and `SameSite=None`).
    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,
    /// Rate limit for login/register (requests per minute).
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
    /// Rate limit for general API endpoints (requests per minute).
    #[serde(default = "default_api_rate_limit")]
    pub api_rate_limit: u32,
}

fn default_jwt_access_expiry() -> u64 {
    900 // 15 minutes
}

fn default_jwt_refresh_expiry() -> u64 {
    7
}

fn default_cookie_secure() -> bool {
    true
}

fn default_login_rate_limit() -> u32 {
    10
}

fn default_api_rate_limit() -> u32 {
    300
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_access_token_expiry_secs: default_jwt_access_expiry(),
            jwt_refresh_token_expiry_days: default_jwt_refresh_expiry(),
            cookie_secure: default_cookie_secure(),
            login_rate_limit: default_login_rate_limit(),
            api_rate_limit: default_api_rate_limit(),
        }
    }
}

/// Which object store backs uploaded content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Files on the local filesystem, served under `/objects`.
    #[default]
    Local,
    /// Cloudinary upload API.
    Cloudinary,
}

/// Cloudinary credentials.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CloudinaryConfig {
    #[serde(default)]
    pub cloud_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Remote folder that receives uploads.
    #[serde(default = "default_cloudinary_folder")]
    pub folder: String,
}

fn default_cloudinary_folder() -> String {
    "drive_clone".to_string()
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory for the local backend.
    #[serde(default = "default_storage_path")]
    pub local_path: String,
    /// Public base URL under which local objects are reachable.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Cloudinary settings (required when `backend = "cloudinary"`).
    #[serde(default)]
    pub cloudinary: CloudinaryConfig,
}

fn default_storage_path() -> String {
    "data/objects".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:5000/objects".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_path: default_storage_path(),
            public_base_url: default_public_base_url(),
            cloudinary: CloudinaryConfig {
                folder: default_cloudinary_folder(),
                ..Default::default()
            },
        }
    }
}

/// Drive limits.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveConfig {
    /// Quota given to newly registered users, in bytes.
    #[serde(default = "default_storage_limit")]
    pub default_storage_limit: i64,
    /// Maximum upload size in MB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Maximum number of ancestors a folder may have.
    #[serde(default = "default_max_folder_depth")]
    pub max_folder_depth: usize,
    /// Maximum number of folders removed by one recursive delete.
    #[serde(default = "default_max_delete_batch")]
    pub max_delete_batch: usize,
    /// Number of entries returned by the recent-files listing.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: i64,
}

fn default_storage_limit() -> i64 {
    5 * 1024 * 1024 * 1024 // 5 GiB
}

fn default_max_upload_size() -> u64 {
    100
}

fn default_max_folder_depth() -> usize {
    32
}

fn default_max_delete_batch() -> usize {
    10_000
}

fn default_recent_limit() -> i64 {
    50
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            default_storage_limit: default_storage_limit(),
            max_upload_size_mb: default_max_upload_size(),
            max_folder_depth: default_max_folder_depth(),
            max_delete_batch: default_max_delete_batch(),
            recent_limit: default_recent_limit(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/cumulus.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(CumulusError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CumulusError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `CUMULUS_JWT_SECRET`
    /// - `CUMULUS_DATABASE_PATH`
    /// - `CUMULUS_CLOUDINARY_API_SECRET`
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = non_empty_env("CUMULUS_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = non_empty_env("CUMULUS_DATABASE_PATH") {
            self.database.path = v;
        }
        if let Some(v) = non_empty_env("CUMULUS_CLOUDINARY_API_SECRET") {
            self.storage.cloudinary.api_secret = v;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(CumulusError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via CUMULUS_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Cloudinary {
            let c = &self.storage.cloudinary;
            if c.cloud_name.is_empty() || c.api_key.is_empty() || c.api_secret.is_empty() {
                return Err(CumulusError::Config(
                    "cloudinary backend requires cloud_name, api_key and api_secret".to_string(),
                ));
            }
        }
        if self.drive.default_storage_limit <= 0 {
            return Err(CumulusError::Config(
                "default_storage_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
