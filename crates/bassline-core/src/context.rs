//! Request context types.
//!
//! A [`RequestContext`] is the immutable bundle a handler receives on each
//! dispatch step: the remaining path, the authenticated user, the shared
//! [`SiteConfig`] and the parsed request. Narrowing the path with
//! [`RequestContext::child`] or [`RequestContext::with_path`] produces a new
//! context; the shared parts are reference counted.

use std::sync::Arc;

use bassline_router::PathComponents;
use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AuthenticatedUser, BasslineError, BasslineResult, SHELL_APP};

/// A unique identifier for each request, using UUID v7.
///
/// # Example
///
/// ```
/// use bassline_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new time-ordered request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An app mounted under `/<key>/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    /// First path segment selecting the app.
    pub key: String,
    /// Display title.
    pub title: String,
    /// Capabilities the app defines, unqualified.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Site-wide settings shared by every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Display name of the site.
    pub site_name: String,
    /// Delegations allowed beyond the request path's segment count.
    pub max_extra_delegations: usize,
    /// Mounted apps, in display order.
    #[serde(default)]
    pub apps: Vec<AppInfo>,
}

impl SiteConfig {
    /// Default for [`max_extra_delegations`](Self::max_extra_delegations).
    pub const DEFAULT_MAX_EXTRA_DELEGATIONS: usize = 8;

    /// Returns the mounted app with `key`.
    #[must_use]
    pub fn app(&self, key: &str) -> Option<&AppInfo> {
        self.apps.iter().find(|app| app.key == key)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_name: "Bassline".to_string(),
            max_extra_delegations: Self::DEFAULT_MAX_EXTRA_DELEGATIONS,
            apps: Vec::new(),
        }
    }
}

/// The parts of the HTTP request handlers may read.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    /// Request method.
    pub method: Method,
    /// Raw query string, without the leading `?`.
    pub query: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Fully buffered request body.
    pub body: Bytes,
}

impl RequestParts {
    /// Creates request parts with an empty body.
    #[must_use]
    pub fn new(method: Method, query: impl Into<String>) -> Self {
        Self {
            method,
            query: query.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Deserializes the query string.
    pub fn query_params<T: DeserializeOwned>(&self) -> BasslineResult<T> {
        serde_urlencoded::from_str(&self.query)
            .map_err(|e| BasslineError::validation(format!("invalid query string: {e}")))
    }

    /// Deserializes a form body, falling back to the query string when the
    /// body is empty.
    pub fn form_params<T: DeserializeOwned>(&self) -> BasslineResult<T> {
        if self.body.is_empty() {
            return self.query_params();
        }
        serde_urlencoded::from_bytes(&self.body)
            .map_err(|e| BasslineError::validation(format!("invalid form body: {e}")))
    }

    /// Deserializes a JSON body.
    pub fn json_body<T: DeserializeOwned>(&self) -> BasslineResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| BasslineError::validation(format!("invalid JSON body: {e}")))
    }
}

/// Per-step dispatch context.
///
/// # Example
///
/// ```
/// use bassline_core::RequestContext;
///
/// let ctx = RequestContext::mock("/site/admin/theme");
/// let child = ctx.child().unwrap();
/// assert_eq!(child.path().path(), "/admin/theme");
/// assert_eq!(child.request_path().path(), "/site/admin/theme");
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    request_path: Arc<PathComponents>,
    path: PathComponents,
    app_key: Arc<str>,
    user: Option<Arc<AuthenticatedUser>>,
    config: Arc<SiteConfig>,
    request: Arc<RequestParts>,
}

impl RequestContext {
    /// Creates the root context for a request; the remaining path starts as
    /// the full request path.
    #[must_use]
    pub fn new(request_path: PathComponents, config: Arc<SiteConfig>, request: RequestParts) -> Self {
        Self {
            request_id: RequestId::new(),
            path: request_path.clone(),
            request_path: Arc::new(request_path),
            app_key: Arc::from(SHELL_APP),
            user: None,
            config,
            request: Arc::new(request),
        }
    }

    /// Creates a GET context for `path` with default site settings.
    #[must_use]
    pub fn mock(path: &str) -> Self {
        Self::new(
            PathComponents::parse(path),
            Arc::new(SiteConfig::default()),
            RequestParts::default(),
        )
    }

    /// Returns a context with the given request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns a context with the given authenticated user.
    #[must_use]
    pub fn with_user(mut self, user: AuthenticatedUser) -> Self {
        self.user = Some(Arc::new(user));
        self
    }

    /// Returns a context serving the app `app_key`.
    #[must_use]
    pub fn with_app(mut self, app_key: &str) -> Self {
        self.app_key = Arc::from(app_key);
        self
    }

    /// Returns a context whose remaining path is `path`.
    #[must_use]
    pub fn with_path(&self, path: PathComponents) -> Self {
        Self {
            path,
            ..self.clone()
        }
    }

    /// Returns a context with the first remaining segment consumed, or
    /// `None` when the remaining path is the root.
    #[must_use]
    pub fn child(&self) -> Option<Self> {
        self.path.child().map(|path| self.with_path(path))
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the remaining path.
    #[must_use]
    pub const fn path(&self) -> &PathComponents {
        &self.path
    }

    /// Returns the full request path.
    #[must_use]
    pub fn request_path(&self) -> &PathComponents {
        &self.request_path
    }

    /// Returns the key of the app serving the request.
    #[must_use]
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    /// Returns the authenticated user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.user.as_deref()
    }

    /// Returns the authenticated user or an authentication error.
    pub fn require_user(&self) -> BasslineResult<&AuthenticatedUser> {
        self.user()
            .ok_or_else(|| BasslineError::authentication("login required"))
    }

    /// Returns the authenticated user if they hold `capability` of the app
    /// serving the request.
    pub fn require_capability(&self, capability: &str) -> BasslineResult<&AuthenticatedUser> {
        let user = self.require_user()?;
        if user.can_in(&self.app_key, capability) {
            Ok(user)
        } else {
            Err(BasslineError::missing_capability(capability))
        }
    }

    /// Returns the site settings.
    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Returns the parsed request.
    #[must_use]
    pub fn request(&self) -> &RequestParts {
        &self.request
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.request.method
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_request_id_new_generates_unique_ids() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_request_id_serialization() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_child_narrows_path_only() {
        let ctx = RequestContext::mock("/a/b/c").with_user(AuthenticatedUser::new(1, "a"));
        let child = ctx.child().unwrap();

        assert_eq!(child.path().path(), "/b/c");
        assert_eq!(child.request_path().path(), "/a/b/c");
        assert_eq!(child.request_id(), ctx.request_id());
        assert_eq!(child.user().unwrap().id, 1);
        // original untouched
        assert_eq!(ctx.path().path(), "/a/b/c");
    }

    #[test]
    fn test_child_at_root_is_none() {
        assert!(RequestContext::mock("/").child().is_none());
    }

    #[test]
    fn test_require_user() {
        let ctx = RequestContext::mock("/");
        assert_eq!(
            ctx.require_user().unwrap_err().status_code(),
            http::StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_require_capability() {
        let ctx = RequestContext::mock("/")
            .with_user(AuthenticatedUser::new(2, "bob").with_capability("edit_themes"));
        assert!(ctx.require_capability("edit_themes").is_ok());
        assert_eq!(
            ctx.require_capability("edit_security")
                .unwrap_err()
                .status_code(),
            http::StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_capability_is_checked_in_the_serving_app() {
        let user = AuthenticatedUser::new(2, "bob")
            .with_capability("edit_themes")
            .with_capability("blog.publish");
        let shell = RequestContext::mock("/").with_user(user.clone());
        assert_eq!(shell.app_key(), SHELL_APP);
        assert!(shell.require_capability("publish").is_err());

        let blog = RequestContext::mock("/").with_app("blog").with_user(user);
        assert!(blog.require_capability("publish").is_ok());
        assert!(blog.require_capability("edit_themes").is_err());
        assert_eq!(blog.with_path(PathComponents::parse("/x")).app_key(), "blog");
    }

    #[test]
    fn test_site_app_lookup() {
        let config = SiteConfig {
            apps: vec![AppInfo {
                key: "blog".to_string(),
                title: "Blog".to_string(),
                capabilities: vec!["publish".to_string()],
            }],
            ..SiteConfig::default()
        };
        assert_eq!(config.app("blog").map(|a| a.title.as_str()), Some("Blog"));
        assert!(config.app("wiki").is_none());

        let legacy: SiteConfig =
            serde_json::from_str(r#"{"site_name": "x", "max_extra_delegations": 2}"#).unwrap();
        assert!(legacy.apps.is_empty());
    }

    #[derive(Debug, Deserialize)]
    struct EditQuery {
        id: i64,
    }

    #[test]
    fn test_query_params() {
        let parts = RequestParts::new(Method::GET, "id=12&extra=x");
        let query: EditQuery = parts.query_params().unwrap();
        assert_eq!(query.id, 12);

        let bad = RequestParts::new(Method::GET, "id=twelve");
        assert!(bad.query_params::<EditQuery>().is_err());
    }

    #[test]
    fn test_json_body() {
        let parts = RequestParts::new(Method::POST, "").with_body(r#"{"id": 4}"#);
        let body: EditQuery = parts.json_body().unwrap();
        assert_eq!(body.id, 4);

        let empty = RequestParts::new(Method::POST, "");
        assert!(empty.json_body::<EditQuery>().is_err());
    }

    #[test]
    fn test_form_params_prefer_body() {
        let parts = RequestParts::new(Method::POST, "id=1").with_body("id=9");
        assert_eq!(parts.form_params::<EditQuery>().unwrap().id, 9);

        let parts = RequestParts::new(Method::POST, "id=1");
        assert_eq!(parts.form_params::<EditQuery>().unwrap().id, 1);

        let bad = RequestParts::new(Method::POST, "").with_body("id=x");
        assert!(bad.form_params::<EditQuery>().is_err());
    }
}
