//! Structured logging.
//!
//! Installs a global `tracing-subscriber` registry with an [`EnvFilter`] and
//! either JSON or pretty output.
//!
//! # Example
//!
//! ```rust,no_run
//! use bassline_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development()).unwrap();
//! tracing::info!(resource = "theme#1", "reservation granted");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g., "info" or "bassline_core=debug,info").
    pub level: String,

    /// Whether to output JSON.
    pub json_format: bool,

    /// Whether to emit ANSI colors.
    pub ansi: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable debug output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            ansi: true,
            file_line_info: true,
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            ansi: false,
            file_line_info: false,
        }
    }
}

/// Installs the global subscriber.
///
/// Returns `Ok(true)` if this call installed it and `Ok(false)` if a global
/// subscriber was already in place, so calling it twice is harmless.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter directive is invalid.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<bool> {
    if !config.enabled {
        return Ok(false);
    }

    let filter = create_env_filter(&config.level)?;

    if tracing::dispatcher::has_been_set() {
        return Ok(false);
    }

    let result = if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(config.ansi)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(config.ansi)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).try_init()
    };

    match result {
        Ok(()) => Ok(true),
        // lost a race with another initializer
        Err(_) if tracing::dispatcher::has_been_set() => Ok(false),
        Err(e) => Err(TelemetryError::LoggingInit(e.to_string())),
    }
}

/// Creates an env filter from a directive string.
///
/// # Errors
///
/// Returns error if the directive is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("invalid log filter '{filter}': {e}")))
}

/// Logs the start of a request.
#[macro_export]
macro_rules! log_request_start {
    ($request_id:expr, $method:expr, $path:expr) => {
        tracing::info!(
            request_id = %$request_id,
            http.method = %$method,
            http.path = %$path,
            "request started"
        );
    };
}

/// Logs the completion of a request.
#[macro_export]
macro_rules! log_request_complete {
    ($request_id:expr, $status:expr, $duration_ms:expr) => {
        tracing::info!(
            request_id = %$request_id,
            http.status_code = $status,
            duration_ms = $duration_ms,
            "request completed"
        );
    };
}

/// Logs a request that ended in a server error.
#[macro_export]
macro_rules! log_request_error {
    ($request_id:expr, $error:expr) => {
        tracing::error!(
            request_id = %$request_id,
            error = %$error,
            "request failed"
        );
    };
}
