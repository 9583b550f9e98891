//! Configuration management for AppleBites services.
//!
//! All AppleBites services share a unified configuration file at
//! `~/.applebites/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (APPLEBITES_* prefix, GHL_* for CRM credentials)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `APPLEBITES_PORT` → server.port
//! - `APPLEBITES_BIND_ADDRESS` → server.host
//! - `APPLEBITES_DB_PATH` → storage.db_path
//! - `APPLEBITES_LOG_LEVEL` → observability.log_level
//! - `APPLEBITES_LOG_FORMAT` → observability.log_format
//! - `APPLEBITES_EXPORT_TRANSPORT` → export.transport
//! - `GHL_API_KEY` → export.api_key
//! - `GHL_WEBHOOK_URL` → export.webhook_url

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".applebites"),
        |dirs| dirs.home_dir().join(".applebites"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the service.
    /// Default: "127.0.0.1" (conservative, local only)
    /// Set to "0.0.0.0" for remote access
    #[serde(default = "default_bind_address")]
    pub host: String,

    /// Port for the valuation API
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4480
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Assessment store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Path to the SQLite database. Defaults to `~/.applebites/assessments.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the database path, falling back to the default location.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| config_dir().join("assessments.db"))
    }
}

// ============================================================================
// CRM Export Configuration
// ============================================================================

/// CRM export adapter configuration.
///
/// The export dispatcher delivers assessment contacts to the downstream CRM
/// over one of two transports: the REST contact API or an inbound webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Whether export dispatch is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Transport kind: "rest" or "webhook"
    #[serde(default = "default_export_transport")]
    pub transport: String,

    /// Base URL of the CRM REST API
    #[serde(default = "default_rest_endpoint")]
    pub rest_endpoint: String,

    /// Inbound webhook URL (required for the webhook transport)
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// API key for the REST transport
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum delivery attempts per record
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts in milliseconds (doubles per attempt)
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Interval between dispatch passes in seconds
    #[serde(default = "default_dispatch_interval_secs")]
    pub dispatch_interval_secs: u64,

    /// Outbound request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            transport: default_export_transport(),
            rest_endpoint: default_rest_endpoint(),
            webhook_url: None,
            api_key: None,
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            dispatch_interval_secs: default_dispatch_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_export_transport() -> String {
    "rest".into()
}

fn default_rest_endpoint() -> String {
    "https://rest.gohighlevel.com".into()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_dispatch_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" for structured JSON, "pretty" for human-readable
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Unified configuration for AppleBites services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Assessment store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// CRM export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// Returns defaults when the config file does not exist.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable fallbacks.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("APPLEBITES_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(bind) = std::env::var("APPLEBITES_BIND_ADDRESS") {
            self.server.host = bind;
        }
        if let Ok(path) = std::env::var("APPLEBITES_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(path));
        }
        if let Ok(level) = std::env::var("APPLEBITES_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("APPLEBITES_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(transport) = std::env::var("APPLEBITES_EXPORT_TRANSPORT") {
            self.export.transport = transport;
        }
        if let Ok(key) = std::env::var("GHL_API_KEY") {
            self.export.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("GHL_WEBHOOK_URL") {
            self.export.webhook_url = Some(url);
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let dir = config_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir {}", dir.display()))?;

        let path = config_path();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

// ============================================================================
// Tests
// ============================================================================
