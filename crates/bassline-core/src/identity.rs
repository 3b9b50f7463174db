//! Authenticated user identity.
//!
//! The transport layer resolves the `login` cookie into an
//! [`AuthenticatedUser`] and places it on the [`RequestContext`]; handlers
//! check capabilities with [`AuthenticatedUser::can`].
//!
//! Capabilities belong to an app. The shell's are stored bare
//! (`edit_themes`); a mounted app's are stored as `app.capability`.
//!
//! [`RequestContext`]: crate::RequestContext

use serde::{Deserialize, Serialize};

/// Identifier of a user row.
pub type UserId = i64;

/// Key of the shell app, which owns every unmounted path.
pub const SHELL_APP: &str = "shell";

/// Returns the stored name of `capability` in `app`.
///
/// ```rust
/// use bassline_core::{qualified_capability, SHELL_APP};
///
/// assert_eq!(qualified_capability(SHELL_APP, "edit_themes"), "edit_themes");
/// assert_eq!(qualified_capability("blog", "publish"), "blog.publish");
/// ```
#[must_use]
pub fn qualified_capability(app: &str, capability: &str) -> String {
    if app == SHELL_APP {
        capability.to_string()
    } else {
        format!("{app}.{capability}")
    }
}

/// A logged-in user.
///
/// # Example
///
/// ```rust
/// use bassline_core::AuthenticatedUser;
///
/// let user = AuthenticatedUser::new(2, "alice").with_capability("edit_themes");
/// assert!(user.can("edit_themes"));
/// assert!(!user.can("edit_security"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    /// User row id.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Superusers hold every capability.
    #[serde(default)]
    pub is_superuser: bool,
    /// Capabilities granted through group membership.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AuthenticatedUser {
    /// Creates a user with no capabilities.
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            is_superuser: false,
            capabilities: Vec::new(),
        }
    }

    /// Creates a superuser.
    #[must_use]
    pub fn superuser(id: UserId, username: impl Into<String>) -> Self {
        Self {
            is_superuser: true,
            ..Self::new(id, username)
        }
    }

    /// Adds a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Returns `true` if the user is a superuser or holds the shell
    /// capability `capability`.
    #[must_use]
    pub fn can(&self, capability: &str) -> bool {
        self.can_in(SHELL_APP, capability)
    }

    /// Returns `true` if the user is a superuser or holds `capability` of
    /// `app`.
    #[must_use]
    pub fn can_in(&self, app: &str, capability: &str) -> bool {
        if self.is_superuser {
            return true;
        }
        let wanted = qualified_capability(app, capability);
        self.capabilities.iter().any(|c| *c == wanted)
    }

    /// Returns a string identifier suitable for logging.
    #[must_use]
    pub fn log_id(&self) -> String {
        format!("user:{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superuser_can_everything() {
        let root = AuthenticatedUser::superuser(1, "root");
        assert!(root.can("edit_themes"));
        assert!(root.can("anything"));
    }

    #[test]
    fn test_capabilities() {
        let user = AuthenticatedUser::new(2, "bob").with_capability("edit_security");
        assert!(user.can("edit_security"));
        assert!(!user.can("edit_themes"));
    }

    #[test]
    fn test_capabilities_are_scoped_to_an_app() {
        let user = AuthenticatedUser::new(2, "bob")
            .with_capability("edit_themes")
            .with_capability("blog.publish");
        assert!(user.can_in("blog", "publish"));
        assert!(!user.can("publish"));
        assert!(!user.can_in("blog", "edit_themes"));
        assert!(!user.can_in("wiki", "publish"));
        assert!(user.can_in(SHELL_APP, "edit_themes"));
        assert!(AuthenticatedUser::superuser(1, "root").can_in("wiki", "publish"));
    }

    #[test]
    fn test_log_id() {
        assert_eq!(AuthenticatedUser::new(42, "x").log_id(), "user:42");
    }

    #[test]
    fn test_serialization_defaults() {
        let user: AuthenticatedUser =
            serde_json::from_str(r#"{"id": 3, "username": "carol"}"#).unwrap();
        assert!(!user.is_superuser);
        assert!(user.capabilities.is_empty());

        let json = serde_json::to_value(AuthenticatedUser::superuser(1, "root")).unwrap();
        assert_eq!(json["isSuperuser"], true);
    }
}
