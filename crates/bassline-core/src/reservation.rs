//! Clock-driven reservation service.

use std::sync::Arc;

use thiserror::Error;

use crate::save_token::{ReservationConflict, SaveToken, TokenDecodeError, RESERVE_SECONDS};
use crate::{Clock, SystemClock, UserId};

/// Failure of [`Reservations::try_reserve_encoded`].
#[derive(Debug, Error)]
pub enum ReservationError {
    /// Someone else holds the reservation.
    #[error(transparent)]
    Conflict(#[from] ReservationConflict),
    /// The stored token is unreadable; the holder is unknown.
    #[error(transparent)]
    Decode(#[from] TokenDecodeError),
}

/// Issues and renews [`SaveToken`]s against a [`Clock`].
///
/// # Example
///
/// ```rust
/// use bassline_core::Reservations;
///
/// let reservations = Reservations::system();
/// let token = reservations.create_for_user(1);
///
/// // another user cannot take it over inside the grace window
/// assert!(reservations.try_reserve(&token, 2, None).is_err());
/// // the holder can renew at once
/// assert!(reservations.try_reserve(&token, 1, Some(token.key())).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Reservations {
    clock: Arc<dyn Clock>,
    grace_seconds: i64,
}

impl Reservations {
    /// Creates a service with the given clock and grace window.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, grace_seconds: i64) -> Self {
        Self {
            clock,
            grace_seconds,
        }
    }

    /// Uses the system clock and the default grace window.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), RESERVE_SECONDS)
    }

    /// Returns the grace window in seconds.
    #[must_use]
    pub const fn grace_seconds(&self) -> i64 {
        self.grace_seconds
    }

    /// Returns the current Unix time.
    #[must_use]
    pub fn now(&self) -> i64 {
        self.clock.now_unix()
    }

    /// Issues a token for a resource that has none.
    #[must_use]
    pub fn create_for_user(&self, user: UserId) -> SaveToken {
        SaveToken::issue(user, self.now())
    }

    /// Attempts to take over `token` for `user`.
    pub fn try_reserve(
        &self,
        token: &SaveToken,
        user: UserId,
        supplied_key: Option<&str>,
    ) -> Result<SaveToken, ReservationConflict> {
        token.try_reserve_at(user, supplied_key, self.now(), self.grace_seconds)
    }

    /// Attempts a reservation against a stored token, issuing a fresh token
    /// when nothing is stored yet.
    pub fn try_reserve_encoded(
        &self,
        encoded: Option<&str>,
        user: UserId,
        supplied_key: Option<&str>,
    ) -> Result<SaveToken, ReservationError> {
        match encoded {
            None => Ok(self.create_for_user(user)),
            Some(encoded) => {
                let token = SaveToken::decode(encoded)?;
                Ok(self.try_reserve(&token, user, supplied_key)?)
            }
        }
    }
}

impl Default for Reservations {
    fn default() -> Self {
        Self::system()
    }
}
