//! Typed configuration for Bassline.
//!
//! [`BasslineConfig`] holds every setting of a Bassline server:
//!
//! - [`ServerConfig`] - bind address, timeouts, body limit
//! - [`SiteSection`] - site name
//! - [`SessionConfig`] - grace window, lock timeout, `Retry-After` hint
//! - [`RoutingConfig`] - delegation limit
//! - [`TelemetrySection`] - logging and metrics
//!
//! Unknown fields are rejected everywhere.
//!
//! # Example
//!
//! ```no_run
//! use bassline_config::ConfigLoader;
//!
//! # fn main() -> Result<(), bassline_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("bassline.toml")?
//!     .with_dotenv()?
//!     .with_env_prefix("BASSLINE")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_ms = 30000
//!
//! [site]
//! site_name = "Bassline"
//!
//! # first path segment `/blog/` selects this app
//! [site.apps.blog]
//! title = "Blog"
//! capabilities = ["publish"]
//!
//! [session]
//! grace_seconds = 10
//! lock_timeout_ms = 2000
//! retry_after_secs = 5
//!
//! [routing]
//! max_extra_delegations = 8
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment overrides
//!
//! `PREFIX__SECTION__KEY`, nested sections joined with `__`:
//!
//! - `BASSLINE__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `BASSLINE__TELEMETRY__LOGGING__LEVEL=debug`
//!
//! Mounted apps come from files only.

#![doc(html_root_url = "https://docs.rs/bassline-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::BasslineConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    AppSection, LogFormat, LoggingConfig, MetricsConfig, RoutingConfig, ServerConfig, SessionConfig,
    SiteSection, TelemetrySection,
};
