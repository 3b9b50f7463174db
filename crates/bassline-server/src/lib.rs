//! # Bassline Server
//!
//! HTTP transport for Bassline.
//!
//! - [`Transport`]: maps `http` requests onto the dispatcher, resolves the
//!   `login` cookie, and renders errors as JSON envelopes
//! - [`Server`]: the hyper accept loop with connection limits and graceful
//!   shutdown
//!
//! Status mapping follows [`BasslineError::status_code`](bassline_core::BasslineError::status_code);
//! `StorageUnavailable` adds `Retry-After`, and every response carries an
//! `x-request-id` header matching the `request_id` of any error body.

#![doc(html_root_url = "https://docs.rs/bassline-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
mod config;
mod error;
mod server;
mod shutdown;
mod transport;

pub use config::{
    ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_MAX_CONNECTIONS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use error::ServerError;
pub use server::{BoundServer, Server};
pub use shutdown::{ConnectionLimiter, ShutdownSignal};
pub use transport::{
    error_response, location, HttpResponse, ResponseBody, Transport, REQUEST_ID_HEADER,
};
