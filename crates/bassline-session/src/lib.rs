//! # Bassline Session
//!
//! Save-token edit sessions for Bassline resources.
//!
//! An [`EditSession`] coordinates independent HTTP requests that edit the same
//! resource. It locks the resource row through a [`ResourceStore`], checks the
//! row's save token with [`Reservations`](bassline_core::Reservations), and
//! writes the new token back together with any changes. Conflicts come back as
//! [`EditOutcome::Conflict`] values naming the holder via a [`UserDirectory`].
//!
//! [`MemoryStore`] and [`StoreDirectory`] are the bundled collaborators; the
//! directory reads users and groups from the store.

#![doc(html_root_url = "https://docs.rs/bassline-session/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod directory;
mod lock;
mod memory;
mod resource;
mod session;
mod store;

pub use directory::{StoreDirectory, UserDirectory, MAX_LOGINS_PER_USER};
pub use lock::{LockGuard, LockTable, DEFAULT_LOCK_TIMEOUT, DEFAULT_RETRY_AFTER_SECS};
pub use memory::MemoryStore;
pub use resource::{Fields, ResourceKey, ResourceKind, ResourceRecord};
pub use session::{EditAction, EditConflict, EditOutcome, EditSession, UNKNOWN_HOLDER};
pub use store::{ResourceGuard, ResourceStore};
