//! Configuration sections.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP server settings.
///
/// # Example
///
/// ```
/// use bassline_config::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.request_timeout().as_secs(), 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Shutdown timeout as a [`Duration`].
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_connections: default_max_connections(),
            request_timeout_ms: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    10000
}

fn default_request_timeout() -> u64 {
    30000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Site identity and mounted apps.
///
/// # Example
///
/// ```
/// use bassline_config::SiteSection;
///
/// let site: SiteSection = toml::from_str(
///     "site_name = 'Studio'\n[apps.blog]\ntitle = 'Blog'\ncapabilities = ['publish']\n",
/// )
/// .unwrap();
/// assert_eq!(site.apps["blog"].capabilities, vec!["publish"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    /// Name shown on the landing page.
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Apps mounted under `/<key>/`, by key.
    #[serde(default)]
    pub apps: BTreeMap<String, AppSection>,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            apps: BTreeMap::new(),
        }
    }
}

/// One mounted app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppSection {
    /// Display title.
    pub title: String,

    /// Capabilities groups may grant in this app.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

fn default_site_name() -> String {
    "Bassline".to_string()
}

/// Delegated routing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Delegations allowed beyond one per request path segment.
    #[serde(default = "default_max_extra_delegations")]
    pub max_extra_delegations: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_extra_delegations: default_max_extra_delegations(),
        }
    }
}

fn default_max_extra_delegations() -> usize {
    8
}

/// Edit-session settings.
///
/// # Example
///
/// ```
/// use bassline_config::SessionConfig;
///
/// let config = SessionConfig::default();
/// assert_eq!(config.grace_seconds, 10);
/// assert_eq!(config.retry_after_secs, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Seconds a reservation is protected from other users.
    #[serde(default = "default_grace_seconds")]
    pub grace_seconds: i64,

    /// How long to wait for a resource lock, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// `Retry-After` hint sent when a lock could not be taken.
    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,
}

impl SessionConfig {
    /// Lock timeout as a [`Duration`].
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grace_seconds: default_grace_seconds(),
            lock_timeout_ms: default_lock_timeout_ms(),
            retry_after_secs: default_retry_after_secs(),
        }
    }
}

fn default_grace_seconds() -> i64 {
    10
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_retry_after_secs() -> u64 {
    5
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,

    /// Prometheus listener address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g., "info" or "bassline_core=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include ANSI color codes in output.
    #[serde(default)]
    pub ansi_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            ansi_enabled: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Service name attached to logs.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Metrics exporter.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "bassline".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn test_server_config_partial_toml() {
        let config: ServerConfig = toml::from_str(r#"http_addr = "127.0.0.1:3000""#).unwrap();
        assert_eq!(config.http_addr, "127.0.0.1:3000");
        assert_eq!(config.request_timeout_ms, 30000);
    }

    #[test]
    fn test_server_config_unknown_field_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str("http2_enabled = true");
        assert!(result.is_err());
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.grace_seconds, 10);
        assert_eq!(config.lock_timeout(), Duration::from_secs(2));
        assert_eq!(config.retry_after_secs, 5);
    }

    #[test]
    fn test_routing_default() {
        assert_eq!(RoutingConfig::default().max_extra_delegations, 8);
    }

    #[test]
    fn test_log_format_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: LogFormat,
        }
        let json: Wrapper = toml::from_str(r#"format = "json""#).unwrap();
        let pretty: Wrapper = toml::from_str(r#"format = "pretty""#).unwrap();
        assert_eq!(json.format, LogFormat::Json);
        assert_eq!(pretty.format, LogFormat::Pretty);
    }

    #[test]
    fn test_metrics_disabled_by_default() {
        let telemetry = TelemetrySection::default();
        assert!(!telemetry.metrics.enabled);
        assert!(telemetry.logging.enabled);
        assert_eq!(telemetry.service_name, "bassline");
    }
}
