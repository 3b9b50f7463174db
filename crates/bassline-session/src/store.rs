//! The storage collaborator.

use std::any::Any;
use std::fmt;

use async_trait::async_trait;
use bassline_core::{BasslineResult, SaveToken};

use crate::{Fields, ResourceKey, ResourceKind, ResourceRecord};

/// Proof of exclusive access to one resource row.
///
/// Reads and writes of a row take the guard, so the load-decide-write
/// sequence always runs inside one serialized unit. Dropping the guard
/// releases the row.
pub struct ResourceGuard {
    key: ResourceKey,
    _permit: Box<dyn Any + Send + Sync>,
}

impl ResourceGuard {
    /// Wraps a store-specific permit for `key`.
    pub fn new(key: ResourceKey, permit: impl Any + Send + Sync) -> Self {
        Self {
            key,
            _permit: Box::new(permit),
        }
    }

    /// The guarded resource.
    #[must_use]
    pub const fn key(&self) -> ResourceKey {
        self.key
    }
}

impl fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Storage for editable resources and their save tokens.
#[async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    /// Takes exclusive access to `key`'s row.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if access cannot be obtained in time.
    async fn acquire(&self, key: ResourceKey) -> BasslineResult<ResourceGuard>;

    /// Loads the guarded row, or `None` if it does not exist.
    async fn load(&self, guard: &ResourceGuard) -> BasslineResult<Option<ResourceRecord>>;

    /// Writes the token and the fields of the guarded row in one step.
    async fn save_with_token(
        &self,
        guard: &ResourceGuard,
        token: &SaveToken,
        fields: Fields,
    ) -> BasslineResult<()>;

    /// Reads the fields of `key`'s row without taking its lock.
    ///
    /// For lookups that must not wait on an edit in progress.
    async fn read(&self, key: ResourceKey) -> BasslineResult<Option<Fields>>;

    /// Creates a row with no save token and returns its key.
    async fn create(&self, kind: ResourceKind, fields: Fields) -> BasslineResult<ResourceKey>;

    /// Lists every row of `kind`, ordered by id.
    async fn list(&self, kind: ResourceKind) -> BasslineResult<Vec<ResourceRecord>>;
}
