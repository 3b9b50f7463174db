//! Save tokens.
//!
//! A [`SaveToken`] records who last reserved a resource for editing, when,
//! and the random key that proves possession of that reservation. It is
//! stored as JSON next to the resource row:
//!
//! ```json
//! {"holderId": 2, "reservedAt": 1700000000, "key": "q1b0...=="}
//! ```
//!
//! Every successful reservation replaces the key, so a key acts as a
//! version stamp for optimistic concurrency.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::UserId;

/// Seconds another user must wait after the holder's last reservation.
pub const RESERVE_SECONDS: i64 = 10;

/// Bytes of entropy in a save key.
const KEY_BYTES: usize = 16;

/// A persisted token could not be decoded.
#[derive(Debug, Error)]
pub enum TokenDecodeError {
    /// The stored text is not a valid token document.
    #[error("malformed save token: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The stored text is valid JSON but not an object.
    #[error("save token is not a JSON object")]
    NotAnObject,
}

/// Why a reservation attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The supplied key is not the current key.
    KeyMismatch,
    /// Another user reserved the resource too recently.
    WithinGrace {
        /// Seconds until the grace window ends.
        retry_after_secs: i64,
    },
}

/// A refused reservation, naming the current holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("resource is reserved by user {holder_id}")]
pub struct ReservationConflict {
    /// The user holding the current token.
    pub holder_id: UserId,
    /// Why the attempt was refused.
    pub reason: ConflictReason,
}

/// A time-boxed editing reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveToken {
    holder_id: UserId,
    reserved_at: i64,
    key: String,
}

impl SaveToken {
    /// Issues a token for `holder_id` reserved at `now` with a fresh key.
    #[must_use]
    pub fn issue(holder_id: UserId, now: i64) -> Self {
        Self {
            holder_id,
            reserved_at: now,
            key: generate_key(),
        }
    }

    /// Returns the holder.
    #[must_use]
    pub const fn holder_id(&self) -> UserId {
        self.holder_id
    }

    /// Returns the Unix time of the reservation.
    #[must_use]
    pub const fn reserved_at(&self) -> i64 {
        self.reserved_at
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Attempts to take over this reservation for `user` at `now`.
    ///
    /// `supplied_key` is the key the caller presents; `None` means the
    /// caller is opening the editor and presents the current key implicitly.
    /// The holder may renew at once; anyone else waits `grace` seconds past
    /// [`reserved_at`](Self::reserved_at).
    pub fn try_reserve_at(
        &self,
        user: UserId,
        supplied_key: Option<&str>,
        now: i64,
        grace: i64,
    ) -> Result<Self, ReservationConflict> {
        let conflict = |reason| ReservationConflict {
            holder_id: self.holder_id,
            reason,
        };

        if supplied_key.is_some_and(|key| key != self.key) {
            return Err(conflict(ConflictReason::KeyMismatch));
        }

        let grace = if user == self.holder_id { 0 } else { grace };
        let available_at = self.reserved_at.saturating_add(grace);
        if now < available_at {
            return Err(conflict(ConflictReason::WithinGrace {
                retry_after_secs: available_at - now,
            }));
        }

        Ok(Self::issue(user, now))
    }

    /// Encodes the token for storage.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes a stored token. Unknown fields are ignored.
    pub fn decode(encoded: &str) -> Result<Self, TokenDecodeError> {
        let value: serde_json::Value = serde_json::from_str(encoded)?;
        if !value.is_object() {
            return Err(TokenDecodeError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Generates a base64-encoded random key.
#[must_use]
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Generates a cookie-safe random token from `len` bytes of entropy.
#[must_use]
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
