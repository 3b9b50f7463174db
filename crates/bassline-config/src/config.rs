//! The root [`BasslineConfig`] type.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, LogFormat, RoutingConfig, ServerConfig, SessionConfig, SiteSection,
    TelemetrySection,
};

/// Complete Bassline configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// # Example
///
/// ```
/// use bassline_config::BasslineConfig;
///
/// let config = BasslineConfig::default();
/// assert_eq!(config.site.site_name, "Bassline");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct BasslineConfig {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Site identity.
    #[serde(default)]
    pub site: SiteSection,

    /// Edit sessions.
    #[serde(default)]
    pub session: SessionConfig,

    /// Delegated routing.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl BasslineConfig {
    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - the server or (enabled) metrics address is not a socket address
    /// - the site name is empty
    /// - the grace window is negative
    /// - the lock timeout is zero
    /// - the request timeout does not exceed the lock timeout
    /// - an app key or capability is not a plain lowercase name, or an app
    ///   key is reserved by the shell
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_addr("server.http_addr", &self.server.http_addr)?;

        if self.telemetry.metrics.enabled {
            parse_addr("telemetry.metrics.addr", &self.telemetry.metrics.addr)?;
        }

        if self.site.site_name.trim().is_empty() {
            return Err(ConfigError::invalid_value("site.site_name", "must not be empty"));
        }

        if self.session.grace_seconds < 0 {
            return Err(ConfigError::invalid_value(
                "session.grace_seconds",
                "must not be negative",
            ));
        }

        if self.session.lock_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "session.lock_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.server.request_timeout_ms <= self.session.lock_timeout_ms {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                format!(
                    "must exceed session.lock_timeout_ms ({})",
                    self.session.lock_timeout_ms
                ),
            ));
        }

        for (key, app) in &self.site.apps {
            let field = format!("site.apps.{key}");
            if !is_plain_name(key) {
                return Err(ConfigError::invalid_value(field, "app key must be a lowercase name"));
            }
            if RESERVED_APP_KEYS.contains(&key.as_str()) {
                return Err(ConfigError::invalid_value(field, "app key is reserved"));
            }
            if let Some(bad) = app.capabilities.iter().find(|c| !is_plain_name(c)) {
                return Err(ConfigError::invalid_value(
                    format!("{field}.capabilities"),
                    format!("invalid capability name: {bad}"),
                ));
            }
        }

        if self.server.max_connections == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_connections",
                "must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Parsed server bind address.
    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr("server.http_addr", &self.server.http_addr)
    }

    /// Local development preset: pretty debug logs on loopback.
    ///
    /// ```
    /// use bassline_config::{BasslineConfig, LogFormat};
    ///
    /// let config = BasslineConfig::development();
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.http_addr = "127.0.0.1:8080".to_string();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.ansi_enabled = true;
        config
    }

    /// Production preset: JSON logs and Prometheus metrics.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.metrics.enabled = true;
        config
    }
}

/// First path segments the shell serves itself.
const RESERVED_APP_KEYS: &[&str] = &["shell", "site", "login", "logout"];

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid_value(field, format!("invalid socket address: {value}")))
}
