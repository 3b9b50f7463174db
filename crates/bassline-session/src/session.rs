//! The edit-session protocol.
//!
//! Every editor request, whether it opens a resource or saves changes to it,
//! runs the same sequence inside the resource's lock:
//!
//! 1. acquire the row (timeout → `StorageUnavailable`)
//! 2. load it (missing → `NotFound`)
//! 3. try to reserve its save token for the caller
//! 4. on conflict, release and report the holder
//! 5. on success, write the new token together with any field changes
//!
//! The caller always receives the new token's key, which it must present on
//! the next save.

use std::sync::Arc;

use bassline_core::{
    BasslineError, BasslineResult, ConflictReason, ReservationError, Reservations, UserId,
};
use tracing::{error, info, warn};

use crate::{Fields, ResourceKey, ResourceKind, ResourceRecord, ResourceStore, UserDirectory};

/// Holder name used when a stored token cannot be read.
pub const UNKNOWN_HOLDER: &str = "unknown";

/// Which protocol step was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    /// Opening the editor.
    Open,
    /// Saving changes.
    Save,
}

impl EditAction {
    /// Returns the metrics label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Save => "save",
        }
    }
}

/// A refused edit, naming the current holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditConflict {
    /// The holder, or `None` when the stored token was unreadable.
    pub holder_id: Option<UserId>,
    /// The holder's display name.
    pub holder_name: String,
    /// Message for the end user.
    pub message: String,
}

impl EditConflict {
    fn new(kind: ResourceKind, action: EditAction, holder_id: Option<UserId>, holder_name: String) -> Self {
        let noun = kind.noun();
        let message = match action {
            EditAction::Open => format!(
                "This {noun} is being edited by '{holder_name}'. Try again when the {noun} is no longer being edited."
            ),
            EditAction::Save => format!(
                "This {noun} was recently edited by '{holder_name}' and the information you see may be inaccurate. You will not be able to edit this {noun} until you successfully reload the page."
            ),
        };
        Self {
            holder_id,
            holder_name,
            message,
        }
    }

    /// Converts the conflict into a 409 error for the transport layer.
    #[must_use]
    pub fn into_error(self) -> BasslineError {
        BasslineError::conflict(self.message, self.holder_id, self.holder_name)
    }
}

/// The result of [`EditSession::open`] or [`EditSession::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// The caller holds the reservation.
    Granted {
        /// Key to present on the next save.
        key: String,
        /// The resource as written.
        record: ResourceRecord,
    },
    /// Someone else holds the reservation.
    Conflict(EditConflict),
}

impl EditOutcome {
    /// Returns the granted key and record, or the conflict as an error.
    pub fn into_result(self) -> BasslineResult<(String, ResourceRecord)> {
        match self {
            Self::Granted { key, record } => Ok((key, record)),
            Self::Conflict(conflict) => Err(conflict.into_error()),
        }
    }
}

/// Runs the edit-session protocol against a store.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use bassline_core::Reservations;
/// use bassline_session::{EditOutcome, EditSession, Fields, MemoryStore, ResourceKind, ResourceStore, StoreDirectory};
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// let directory = Arc::new(StoreDirectory::new(store.clone()));
/// let session = EditSession::new(store.clone(), directory, Reservations::system());
///
/// let key = store.create(ResourceKind::Theme, Fields::new()).await.unwrap();
/// let (save_key, _) = session.open(key, 1).await.unwrap().into_result().unwrap();
///
/// let saved = session
///     .save(key, 1, &save_key, |current| Ok(current.clone()))
///     .await
///     .unwrap();
/// assert!(matches!(saved, EditOutcome::Granted { .. }));
/// # });
/// ```
#[derive(Clone)]
pub struct EditSession {
    store: Arc<dyn ResourceStore>,
    directory: Arc<dyn UserDirectory>,
    reservations: Reservations,
}

impl EditSession {
    /// Creates a session runner.
    #[must_use]
    pub fn new(
        store: Arc<dyn ResourceStore>,
        directory: Arc<dyn UserDirectory>,
        reservations: Reservations,
    ) -> Self {
        Self {
            store,
            directory,
            reservations,
        }
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Returns the directory.
    #[must_use]
    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    /// Opens `key` for editing by `user`.
    ///
    /// On success the refreshed token is written with unchanged fields.
    pub async fn open(&self, key: ResourceKey, user: UserId) -> BasslineResult<EditOutcome> {
        self.run(key, user, None, EditAction::Open, |fields| Ok(fields.clone()))
            .await
    }

    /// Saves changes to `key` for `user`, who presents `supplied_key`.
    ///
    /// `apply` receives the current fields and returns the fields to write.
    /// It runs only after the reservation succeeded; if it fails nothing is
    /// written.
    pub async fn save<F>(
        &self,
        key: ResourceKey,
        user: UserId,
        supplied_key: &str,
        apply: F,
    ) -> BasslineResult<EditOutcome>
    where
        F: FnOnce(&Fields) -> BasslineResult<Fields> + Send,
    {
        self.run(key, user, Some(supplied_key), EditAction::Save, apply)
            .await
    }

    async fn run<F>(
        &self,
        key: ResourceKey,
        user: UserId,
        supplied_key: Option<&str>,
        action: EditAction,
        apply: F,
    ) -> BasslineResult<EditOutcome>
    where
        F: FnOnce(&Fields) -> BasslineResult<Fields> + Send,
    {
        let guard = self.store.acquire(key).await?;
        let record = self
            .store
            .load(&guard)
            .await?
            .ok_or_else(|| BasslineError::not_found_resource(key.kind.as_str(), key.id.to_string()))?;

        let token = match self.reservations.try_reserve_encoded(
            record.save_token.as_deref(),
            user,
            supplied_key,
        ) {
            Ok(token) => token,
            Err(ReservationError::Conflict(conflict)) => {
                let holder_name = self
                    .directory
                    .display_name(conflict.holder_id)
                    .await
                    .unwrap_or_else(|| UNKNOWN_HOLDER.to_string());
                let retry_after_secs = match conflict.reason {
                    ConflictReason::WithinGrace { retry_after_secs } => retry_after_secs,
                    ConflictReason::KeyMismatch => 0,
                };
                warn!(
                    resource = %key,
                    action = action.as_str(),
                    user_id = user,
                    holder_id = conflict.holder_id,
                    key_mismatch = matches!(conflict.reason, ConflictReason::KeyMismatch),
                    retry_after_secs,
                    "reservation conflict"
                );
                metrics::counter!("bassline_reservation_conflicts_total", "resource" => key.kind.as_str())
                    .increment(1);
                return Ok(EditOutcome::Conflict(EditConflict::new(
                    key.kind,
                    action,
                    Some(conflict.holder_id),
                    holder_name,
                )));
            }
            Err(ReservationError::Decode(err)) => {
                error!(
                    resource = %key,
                    action = action.as_str(),
                    error = %err,
                    "stored save token is unreadable; refusing to edit"
                );
                metrics::counter!("bassline_reservation_conflicts_total", "resource" => key.kind.as_str())
                    .increment(1);
                return Ok(EditOutcome::Conflict(EditConflict::new(
                    key.kind,
                    action,
                    None,
                    UNKNOWN_HOLDER.to_string(),
                )));
            }
        };

        let fields = apply(&record.fields)?;
        self.store.save_with_token(&guard, &token, fields.clone()).await?;
        drop(guard);

        info!(
            resource = %key,
            action = action.as_str(),
            holder_id = token.holder_id(),
            "reservation granted"
        );
        metrics::counter!(
            "bassline_reservations_total",
            "resource" => key.kind.as_str(),
            "action" => action.as_str()
        )
        .increment(1);

        Ok(EditOutcome::Granted {
            key: token.key().to_string(),
            record: ResourceRecord {
                key,
                fields,
                save_token: token.encode().ok(),
            },
        })
    }
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("reservations", &self.reservations)
            .finish_non_exhaustive()
    }
}
