//! # Bassline Core
//!
//! Core types and traits for the Bassline dispatcher and its save-token
//! edit sessions.
//!
//! - [`RequestContext`]: per-step context carrying the remaining path, the
//!   authenticated user, site settings and the parsed request
//! - [`Handler`], [`Outcome`], [`Delegation`], [`Reply`]: the handler contract
//! - [`Dispatcher`]: the trampoline that follows delegations without recursion
//! - [`AppMounts`]: selects the app serving a request by its first path segment
//! - [`SaveToken`] and [`Reservations`]: time-boxed editing reservations
//! - [`BasslineError`]: the error type and its HTTP mapping

#![doc(html_root_url = "https://docs.rs/bassline-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod clock;
mod context;
mod dispatch;
mod error;
pub mod fixtures;
mod handler;
mod identity;
mod mount;
mod reservation;
pub mod save_token;

pub use bassline_router::{PathComponents, RouteTable};
pub use clock::{Clock, SystemClock};
pub use context::{AppInfo, RequestContext, RequestId, RequestParts, SiteConfig};
pub use dispatch::Dispatcher;
pub use error::{BasslineError, BasslineResult, ErrorCategory, ErrorDetail, ErrorEnvelope, FieldErrors};
pub use handler::{
    Delegation, FnHandler, Handler, HandlerTable, NotFoundHandler, Outcome, Reply, TableHandler,
};
pub use identity::{qualified_capability, AuthenticatedUser, UserId, SHELL_APP};
pub use mount::{AppMounts, Selection};
pub use reservation::{ReservationError, Reservations};
pub use save_token::{ConflictReason, ReservationConflict, SaveToken, TokenDecodeError};
