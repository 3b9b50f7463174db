//! Prometheus metrics.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `bassline_requests_total` | Counter | `status` | Requests by response status |
//! | `bassline_request_duration_seconds` | Histogram | - | Request latency |
//! | `bassline_in_flight_requests` | Gauge | - | Requests being processed |
//! | `bassline_dispatch_steps` | Histogram | - | Handlers visited per request |
//! | `bassline_reservation_conflicts_total` | Counter | `resource` | Refused edit sessions |
//! | `bassline_reservations_total` | Counter | `resource`, `action` | Granted edit sessions |
//!
//! The recording helpers work whether or not an exporter is installed; without
//! one, the `metrics` facade discards the samples.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether to install the exporter.
    pub enabled: bool,

    /// Address of the Prometheus scrape listener.
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Installs the Prometheus recorder and spawns its scrape listener.
///
/// Must be called from within a tokio runtime. Returns `Ok(false)` when
/// disabled or already installed.
///
/// # Errors
///
/// Returns `TelemetryError` if the address is invalid, no runtime is
/// running, or another recorder is installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<bool> {
    if !config.enabled || METRICS_HANDLE.get().is_some() {
        return Ok(false);
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| TelemetryError::MetricsInit(format!("no tokio runtime: {e}")))?;

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .build()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    let _ = METRICS_HANDLE.set(handle);

    runtime.spawn(async move {
        if let Err(e) = exporter.await {
            tracing::error!(error = ?e, "prometheus exporter stopped");
        }
    });

    register_metric_descriptions();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(true)
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!("bassline_requests_total", "HTTP requests by response status");
    describe_histogram!(
        "bassline_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "bassline_in_flight_requests",
        "HTTP requests currently being processed"
    );
    describe_histogram!(
        "bassline_dispatch_steps",
        "Handlers visited while dispatching one request"
    );
    describe_counter!(
        "bassline_reservation_conflicts_total",
        "Edit sessions refused because another user holds the save token"
    );
    describe_counter!(
        "bassline_reservations_total",
        "Edit sessions granted, by action"
    );
}

/// Records a completed request.
pub fn record_request(status_code: u16, duration: Duration) {
    counter!("bassline_requests_total", "status" => status_code.to_string()).increment(1);
    histogram!("bassline_request_duration_seconds").record(duration.as_secs_f64());
}

/// Keeps `bassline_in_flight_requests` raised while alive.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!("bassline_in_flight_requests").increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("bassline_in_flight_requests").decrement(1.0);
    }
}
