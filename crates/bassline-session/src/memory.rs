//! In-memory [`ResourceStore`].

use std::time::Duration;

use async_trait::async_trait;
use bassline_core::{BasslineError, BasslineResult, SaveToken};
use dashmap::DashMap;
use tracing::debug;

use crate::{Fields, LockTable, ResourceGuard, ResourceKey, ResourceKind, ResourceRecord, ResourceStore};

#[derive(Debug, Clone, Default)]
struct Row {
    fields: Fields,
    save_token: Option<String>,
}

/// A [`ResourceStore`] backed by concurrent hash maps.
///
/// The authentication configuration singleton exists from the start.
///
/// # Example
///
/// ```rust
/// use bassline_session::{Fields, MemoryStore, ResourceKind, ResourceStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// let key = store.create(ResourceKind::Theme, Fields::new()).await.unwrap();
///
/// let guard = store.acquire(key).await.unwrap();
/// let record = store.load(&guard).await.unwrap().unwrap();
/// assert!(record.save_token.is_none());
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    locks: LockTable,
    rows: DashMap<ResourceKey, Row>,
    next_ids: DashMap<ResourceKind, i64>,
}

impl MemoryStore {
    /// Creates a store with the default lock timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_locks(LockTable::default())
    }

    /// Creates a store with the given lock timeout and retry hint.
    #[must_use]
    pub fn with_lock_timeout(timeout: Duration, retry_after_secs: u64) -> Self {
        Self::with_locks(LockTable::new(timeout, retry_after_secs))
    }

    fn with_locks(locks: LockTable) -> Self {
        let rows = DashMap::new();
        rows.insert(ResourceKey::auth_config(), Row::default());
        Self {
            locks,
            rows,
            next_ids: DashMap::new(),
        }
    }

    /// Inserts or replaces a row, keeping its token.
    pub fn insert(&self, key: ResourceKey, fields: Fields) {
        self.rows.entry(key).or_default().fields = fields;
        let mut next = self.next_ids.entry(key.kind).or_insert(1);
        *next = (*next).max(key.id + 1);
    }

    /// Overwrites the raw encoded token of a row.
    ///
    /// Bypasses locking; for seeding and repair.
    pub fn set_raw_token(&self, key: ResourceKey, token: Option<String>) {
        if let Some(mut row) = self.rows.get_mut(&key) {
            row.save_token = token;
        }
    }

    /// Returns the raw encoded token of a row.
    #[must_use]
    pub fn raw_token(&self, key: ResourceKey) -> Option<String> {
        self.rows.get(&key).and_then(|row| row.save_token.clone())
    }

    /// Returns the fields of a row without locking.
    #[must_use]
    pub fn peek(&self, key: ResourceKey) -> Option<Fields> {
        self.rows.get(&key).map(|row| row.fields.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn acquire(&self, key: ResourceKey) -> BasslineResult<ResourceGuard> {
        let permit = self.locks.acquire(key).await?;
        Ok(ResourceGuard::new(key, permit))
    }

    async fn load(&self, guard: &ResourceGuard) -> BasslineResult<Option<ResourceRecord>> {
        let key = guard.key();
        Ok(self.rows.get(&key).map(|row| ResourceRecord {
            key,
            fields: row.fields.clone(),
            save_token: row.save_token.clone(),
        }))
    }

    async fn save_with_token(
        &self,
        guard: &ResourceGuard,
        token: &SaveToken,
        fields: Fields,
    ) -> BasslineResult<()> {
        let key = guard.key();
        let encoded = token
            .encode()
            .map_err(|e| BasslineError::internal_with_source("failed to encode save token", e))?;
        let mut row = self
            .rows
            .get_mut(&key)
            .ok_or_else(|| BasslineError::not_found_resource(key.kind.as_str(), key.id.to_string()))?;
        row.fields = fields;
        row.save_token = Some(encoded);
        debug!(resource = %key, holder_id = token.holder_id(), "saved resource");
        Ok(())
    }

    async fn read(&self, key: ResourceKey) -> BasslineResult<Option<Fields>> {
        Ok(self.peek(key))
    }

    async fn create(&self, kind: ResourceKind, fields: Fields) -> BasslineResult<ResourceKey> {
        if kind.is_singleton() {
            return Err(BasslineError::validation(format!(
                "{kind} is a singleton and cannot be created"
            )));
        }

        let id = {
            let mut next = self.next_ids.entry(kind).or_insert(1);
            let id = *next;
            *next += 1;
            id
        };
        let key = ResourceKey::new(kind, id);
        self.rows.insert(
            key,
            Row {
                fields,
                save_token: None,
            },
        );
        debug!(resource = %key, "created resource");
        Ok(key)
    }

    async fn list(&self, kind: ResourceKind) -> BasslineResult<Vec<ResourceRecord>> {
        let mut records: Vec<ResourceRecord> = self
            .rows
            .iter()
            .filter(|entry| entry.key().kind == kind)
            .map(|entry| ResourceRecord {
                key: *entry.key(),
                fields: entry.fields.clone(),
                save_token: entry.save_token.clone(),
            })
            .collect();
        records.sort_by_key(|record| record.key.id);
        Ok(records)
    }
}
