//! Wall-clock source for reservations.

use std::fmt::Debug;

/// Unix-time source.
pub trait Clock: Send + Sync + Debug + 'static {
    /// Current Unix time in seconds.
    fn now_unix(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}
