//! Observability for Bassline.
//!
//! - **Logging**: structured JSON or pretty output through `tracing-subscriber`
//! - **Metrics**: the `metrics` facade with an optional Prometheus exporter
//!
//! Crates record through `tracing` and `metrics` directly; this crate only
//! installs the global subscriber and recorder, and provides the request
//! logging macros used by the server.
//!
//! # Example
//!
//! ```rust,no_run
//! use bassline_telemetry::{init_telemetry, LogConfig, MetricsConfig, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig {
//!         service_name: "bassline".to_string(),
//!         logging: LogConfig::production(),
//!         metrics: MetricsConfig {
//!             enabled: true,
//!             addr: "0.0.0.0:9090".to_string(),
//!         },
//!     };
//!     init_telemetry(&config).unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, record_request, render_metrics, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Settings for every telemetry subsystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name, attached to the startup log line.
    pub service_name: String,

    /// Logging configuration.
    pub logging: LogConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

/// Initializes logging, then metrics.
///
/// Safe to call more than once; later calls leave the installed subscriber
/// and recorder alone.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    tracing::info!(service = %config.service_name, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_telemetry_twice() {
        let config = TelemetryConfig {
            service_name: "test".to_string(),
            ..TelemetryConfig::default()
        };
        init_telemetry(&config).unwrap();
        init_telemetry(&config).unwrap();
    }
}
