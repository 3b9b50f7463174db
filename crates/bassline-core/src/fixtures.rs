//! Test fixtures for Bassline development and testing.
//!
//! These are used by the unit tests of this crate and by the integration
//! tests of the crates built on it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bassline_core::fixtures::ManualClock;
//! use bassline_core::{Clock, Reservations};
//!
//! let clock = Arc::new(ManualClock::new(1_000));
//! let reservations = Reservations::new(clock.clone(), 10);
//! let token = reservations.create_for_user(1);
//!
//! clock.advance(10);
//! assert!(reservations.try_reserve(&token, 2, None).is_ok());
//! ```

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    AuthenticatedUser, BasslineResult, Clock, Delegation, Handler, Outcome, Reply, RequestContext,
};

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock reading `now`.
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Moves the clock forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Sets the clock to `now`.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Replies with an empty body and records the remaining path it saw.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<String>>,
}

impl RecordingHandler {
    /// Creates a handler with an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining paths seen so far, in call order.
    pub fn seen_paths(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    /// Number of times the handler ran.
    pub fn calls(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Handler for RecordingHandler {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(ctx.path().path());
        }
        Ok(Reply::empty().into())
    }
}

/// Always delegates to itself with the same path.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfDelegatingHandler;

#[async_trait]
impl Handler for SelfDelegatingHandler {
    async fn handle(&self, _ctx: &RequestContext) -> BasslineResult<Outcome> {
        Ok(Delegation::to(Arc::new(Self)).into())
    }
}

/// Consumes one segment per step and replies once the path is exhausted.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsumeSegmentHandler;

#[async_trait]
impl Handler for ConsumeSegmentHandler {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        Ok(match ctx.path().child() {
            Some(rest) => Delegation::with_path(Arc::new(Self), rest).into(),
            None => Reply::empty().into(),
        })
    }
}

/// A superuser named `root` with id 1.
#[must_use]
pub fn superuser() -> AuthenticatedUser {
    AuthenticatedUser::superuser(1, "root")
}

/// A plain user with the given capabilities.
#[must_use]
pub fn user_with(id: i64, username: &str, capabilities: &[&str]) -> AuthenticatedUser {
    capabilities
        .iter()
        .fold(AuthenticatedUser::new(id, username), |user, capability| {
            user.with_capability(*capability)
        })
}
