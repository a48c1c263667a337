//! Configuration management for OpenRepo services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration (statistics, harvest queue, featured list)
    pub database: DatabaseConfig,

    /// Object store (Fedora-style) configuration
    pub fedora: FedoraConfig,

    /// Search index (Solr-style) configuration
    pub solr: SolrConfig,

    /// Persistent identifier minter configuration
    pub pidman: PidmanConfig,

    /// Repository-wide settings
    pub repository: RepositoryConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FedoraConfig {
    /// Object store base URL
    pub url: String,

    /// Service account username (management access)
    pub username: Option<String>,

    /// Service account password
    pub password: Option<String>,

    /// Request deadline in seconds; operations past this fail Unavailable
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,

    /// Page size for content-model listings
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolrConfig {
    /// Search index base URL (including core)
    pub url: String,

    /// Request deadline in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PidmanConfig {
    /// Minter REST endpoint; required unless dev_fallback is set
    pub host: Option<String>,

    /// Minter domain the repository mints pids into
    pub domain: Option<String>,

    /// Name Assigning Authority Number for minted ARKs
    #[serde(default = "default_naan")]
    pub naan: String,

    /// In development, mint local UUID-based pids when the minter is
    /// unreachable instead of failing startup
    #[serde(default)]
    pub dev_fallback: bool,

    /// Request deadline in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepositoryConfig {
    /// Pidspace for short-form pids (`<pidspace>:<noid>`)
    #[serde(default = "default_pidspace")]
    pub pidspace: String,

    /// Pid of the collection all published articles belong to
    pub collection_pid: String,

    /// Logins with site-admin authority
    #[serde(default)]
    pub admin_users: Vec<String>,

    /// Logins with the harvest.ingest capability
    #[serde(default)]
    pub harvest_users: Vec<String>,

    /// Directory for reconciler reports
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,

    /// Public base URL used for ARK targets
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_backend_timeout() -> u64 {
    30
}
fn default_page_size() -> u32 {
    100
}
fn default_retries() -> u32 {
    3
}
fn default_naan() -> String {
    "25593".to_string()
}
fn default_pidspace() -> String {
    "oe".to_string()
}
fn default_reports_dir() -> String {
    "reports".to_string()
}
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_json_logging() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_service_name() -> String {
    "openrepo".to_string()
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__FEDORA__URL=http://fedora:8080/fedora
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/openrepo".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
            },
            fedora: FedoraConfig {
                url: "http://localhost:8983/fedora".to_string(),
                username: None,
                password: None,
                timeout_secs: default_backend_timeout(),
                page_size: default_page_size(),
            },
            solr: SolrConfig {
                url: "http://localhost:8983/solr/openrepo".to_string(),
                timeout_secs: default_backend_timeout(),
                max_retries: default_retries(),
            },
            pidman: PidmanConfig {
                host: None,
                domain: None,
                naan: default_naan(),
                dev_fallback: true,
                timeout_secs: default_backend_timeout(),
            },
            repository: RepositoryConfig {
                pidspace: default_pidspace(),
                collection_pid: "oe:collection".to_string(),
                admin_users: Vec::new(),
                harvest_users: Vec::new(),
                reports_dir: default_reports_dir(),
                base_url: default_base_url(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pidman.naan, "25593");
        assert_eq!(config.repository.pidspace, "oe");
    }

    #[test]
    fn test_dev_fallback_defaults_on() {
        let config = AppConfig::default();
        assert!(config.pidman.dev_fallback);
        assert!(config.pidman.host.is_none());
    }
}
