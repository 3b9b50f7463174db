//! The identity collaborator.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bassline_core::save_token::random_token;
use bassline_core::{AuthenticatedUser, BasslineError, BasslineResult, UserId};
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{Fields, ResourceKey, ResourceKind, ResourceStore};

/// Login tokens kept per user; older ones stop resolving.
pub const MAX_LOGINS_PER_USER: usize = 10;

const TOKEN_BYTES: usize = 32;

/// Looks up users for conflict messages and login cookies.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Returns the display name of `id`, if the user exists.
    async fn display_name(&self, id: UserId) -> Option<String>;

    /// Resolves the value of a `login` cookie to a user.
    async fn resolve_login(&self, cookie: &str) -> Option<AuthenticatedUser>;

    /// Starts a login for `id` and returns the `login` cookie value.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist.
    async fn login(&self, id: UserId) -> BasslineResult<String>;

    /// Ends the login identified by `token`.
    async fn logout(&self, token: &str);

    /// Issues a single-use sign-in nonce for `username`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no user has that name.
    async fn issue_nonce(&self, username: &str) -> BasslineResult<String>;

    /// Consumes `nonce` and returns the user it was issued for.
    async fn redeem_nonce(&self, nonce: &str) -> Option<UserId>;
}

/// A [`UserDirectory`] reading users and groups from a [`ResourceStore`].
///
/// User rows carry `username`, `isSuperuser` and `groups`; a user holds
/// the `capabilities` of every group listed. Rows are read on each lookup,
/// so edits to users and groups apply to the next request. Login tokens
/// and nonces live in memory.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use bassline_session::{Fields, MemoryStore, ResourceKey, ResourceKind, StoreDirectory, UserDirectory};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// let mut row = Fields::new();
/// row.insert("username".into(), json!("alice"));
/// store.insert(ResourceKey::new(ResourceKind::User, 2), row);
///
/// let directory = StoreDirectory::new(store);
/// let token = directory.login(2).await.unwrap();
///
/// assert_eq!(directory.display_name(2).await.as_deref(), Some("alice"));
/// assert_eq!(directory.resolve_login(&token).await.unwrap().id, 2);
/// # });
/// ```
pub struct StoreDirectory {
    store: Arc<dyn ResourceStore>,
    logins: DashMap<String, UserId>,
    recent: DashMap<UserId, VecDeque<String>>,
    nonces: DashMap<String, UserId>,
}

impl StoreDirectory {
    /// Creates a directory over `store` with no active logins.
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            logins: DashMap::new(),
            recent: DashMap::new(),
            nonces: DashMap::new(),
        }
    }

    /// Registers `token` as a login for `id`.
    ///
    /// Only the [`MAX_LOGINS_PER_USER`] most recent tokens of a user
    /// resolve.
    pub fn add_login(&self, token: impl Into<String>, id: UserId) {
        let token = token.into();
        self.logins.insert(token.clone(), id);
        let mut recent = self.recent.entry(id).or_default();
        recent.push_back(token);
        while recent.len() > MAX_LOGINS_PER_USER {
            if let Some(expired) = recent.pop_front() {
                self.logins.remove(&expired);
            }
        }
    }

    /// Number of tokens that currently resolve.
    #[must_use]
    pub fn active_logins(&self) -> usize {
        self.logins.len()
    }

    async fn user_row(&self, id: UserId) -> Option<Fields> {
        match self.store.read(ResourceKey::new(ResourceKind::User, id)).await {
            Ok(row) => row,
            Err(e) => {
                warn!(user_id = id, error = %e, "failed to read user");
                None
            }
        }
    }

    async fn group_capabilities(&self, group: i64) -> Vec<String> {
        let row = match self.store.read(ResourceKey::new(ResourceKind::Group, group)).await {
            Ok(row) => row,
            Err(e) => {
                warn!(group_id = group, error = %e, "failed to read group");
                None
            }
        };
        row.as_ref()
            .and_then(|fields| fields.get("capabilities"))
            .and_then(Value::as_array)
            .map(|caps| caps.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    }

    async fn find_username(&self, username: &str) -> BasslineResult<Option<UserId>> {
        let users = self.store.list(ResourceKind::User).await?;
        Ok(users
            .into_iter()
            .find(|record| username_of(&record.fields) == Some(username))
            .map(|record| record.key.id))
    }
}

fn username_of(fields: &Fields) -> Option<&str> {
    fields.get("username").and_then(Value::as_str)
}

#[async_trait]
impl UserDirectory for StoreDirectory {
    async fn display_name(&self, id: UserId) -> Option<String> {
        self.user_row(id).await.as_ref().and_then(username_of).map(str::to_string)
    }

    async fn resolve_login(&self, cookie: &str) -> Option<AuthenticatedUser> {
        let id = *self.logins.get(cookie)?;
        let row = self.user_row(id).await?;

        let mut user = AuthenticatedUser::new(id, username_of(&row).unwrap_or_default());
        user.is_superuser = row.get("isSuperuser").and_then(Value::as_bool).unwrap_or(false);

        let groups: Vec<i64> = row
            .get("groups")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();
        for group in groups {
            for capability in self.group_capabilities(group).await {
                if !user.capabilities.contains(&capability) {
                    user.capabilities.push(capability);
                }
            }
        }
        Some(user)
    }

    async fn login(&self, id: UserId) -> BasslineResult<String> {
        if self.user_row(id).await.is_none() {
            return Err(BasslineError::not_found_resource("user", id.to_string()));
        }
        let token = random_token(TOKEN_BYTES);
        self.add_login(token.clone(), id);
        debug!(user_id = id, "logged in");
        Ok(token)
    }

    async fn logout(&self, token: &str) {
        if let Some((_, id)) = self.logins.remove(token) {
            if let Some(mut recent) = self.recent.get_mut(&id) {
                recent.retain(|t| t != token);
            }
            debug!(user_id = id, "logged out");
        }
    }

    async fn issue_nonce(&self, username: &str) -> BasslineResult<String> {
        let id = self
            .find_username(username)
            .await?
            .ok_or_else(|| BasslineError::not_found_resource("user", username))?;
        let nonce = random_token(TOKEN_BYTES);
        self.nonces.insert(nonce.clone(), id);
        Ok(nonce)
    }

    async fn redeem_nonce(&self, nonce: &str) -> Option<UserId> {
        self.nonces.remove(nonce).map(|(_, id)| id)
    }
}

impl fmt::Debug for StoreDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDirectory")
            .field("active_logins", &self.logins.len())
            .field("pending_nonces", &self.nonces.len())
            .finish_non_exhaustive()
    }
}
