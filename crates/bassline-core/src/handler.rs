//! Handler trait and dispatch outcomes.
//!
//! A [`Handler`] looks at a [`RequestContext`] and either answers the request
//! with a [`Reply`] or hands it to another handler with a [`Delegation`].
//! Handlers never call each other directly; the [`Dispatcher`] follows
//! delegations in a loop.
//!
//! [`Dispatcher`]: crate::Dispatcher

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bassline_router::{PathComponents, Resolution, RouteTable};
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, StatusCode};
use serde::Serialize;

use crate::{BasslineError, BasslineResult, RequestContext};

/// A route table whose leaves are handlers.
pub type HandlerTable = RouteTable<Arc<dyn Handler>>;

/// A request handler.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use bassline_core::{BasslineResult, Handler, Outcome, Reply, RequestContext};
///
/// struct Hello;
///
/// #[async_trait]
/// impl Handler for Hello {
///     async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
///         Ok(Reply::json(&serde_json::json!({ "path": ctx.path().path() }))?.into())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handles one dispatch step.
    ///
    /// # Errors
    ///
    /// Returns [`BasslineError`] when the request cannot be answered; the
    /// transport layer renders it.
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The result of one dispatch step.
#[derive(Debug)]
pub enum Outcome {
    /// Dispatch ends with this reply.
    Reply(Reply),
    /// Dispatch continues with another handler.
    Delegate(Delegation),
}

impl From<Reply> for Outcome {
    fn from(reply: Reply) -> Self {
        Self::Reply(reply)
    }
}

impl From<Delegation> for Outcome {
    fn from(delegation: Delegation) -> Self {
        Self::Delegate(delegation)
    }
}

/// Where dispatch continues next.
#[derive(Clone)]
pub struct Delegation {
    /// The next handler.
    pub handler: Arc<dyn Handler>,
    /// Replacement for the remaining path; `None` keeps the current one.
    pub path_override: Option<PathComponents>,
}

impl Delegation {
    /// Delegates with the current path.
    #[must_use]
    pub fn to(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            path_override: None,
        }
    }

    /// Delegates with a replacement path.
    #[must_use]
    pub fn with_path(handler: Arc<dyn Handler>, path: PathComponents) -> Self {
        Self {
            handler,
            path_override: Some(path),
        }
    }
}

impl fmt::Debug for Delegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegation")
            .field("handler", &self.handler.name())
            .field("path_override", &self.path_override)
            .finish()
    }
}

/// A terminal response produced by a handler.
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    /// A `200 OK` with no body; the request was fully handled.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// An empty reply with the given status.
    #[must_use]
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// A `200 OK` JSON reply.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> BasslineResult<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| BasslineError::internal_with_source("failed to serialize reply", e))?;
        Ok(Self::with_status(StatusCode::OK)
            .header_static(CONTENT_TYPE, "application/json")
            .with_body(body))
    }

    /// A redirect to `location` (`301`, `303`, ...).
    pub fn redirect(status: StatusCode, location: &str) -> BasslineResult<Self> {
        let value = HeaderValue::from_str(location)
            .map_err(|e| BasslineError::internal_with_source("invalid redirect location", e))?;
        let mut reply = Self::with_status(status);
        reply.headers.insert(LOCATION, value);
        Ok(reply)
    }

    /// Sets the status code.
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header, keeping earlier values of the same name.
    pub fn with_header(mut self, name: http::header::HeaderName, value: &str) -> BasslineResult<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| BasslineError::internal_with_source("invalid header value", e))?;
        self.headers.append(name, value);
        Ok(self)
    }

    fn header_static(mut self, name: http::header::HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Splits the reply into its parts.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }
}

/// Answers every request with a 404.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotFoundHandler;

#[async_trait]
impl Handler for NotFoundHandler {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        Err(BasslineError::not_found(format!(
            "no route for '{}'",
            ctx.request_path()
        )))
    }
}

/// A handler that routes through a [`HandlerTable`].
pub struct TableHandler {
    table: HandlerTable,
}

impl TableHandler {
    /// Wraps a route table.
    #[must_use]
    pub fn new(table: HandlerTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Handler for TableHandler {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        Ok(ctx.route(&self.table).into())
    }
}

/// A handler built from an async function.
///
/// # Example
///
/// ```rust
/// use bassline_core::{FnHandler, Outcome, Reply};
///
/// let handler = FnHandler::new(|_ctx| async { Ok(Outcome::from(Reply::empty())) });
/// ```
pub struct FnHandler<F> {
    func: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BasslineResult<Outcome>> + Send + 'static,
{
    /// Creates a function-based handler.
    #[must_use]
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BasslineResult<Outcome>> + Send + 'static,
{
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        (self.func)(ctx.clone()).await
    }
}

impl RequestContext {
    /// Looks up the remaining path in `table`.
    ///
    /// A match delegates to the matched handler with the unconsumed rest of
    /// the path; a miss delegates to [`NotFoundHandler`] so the dispatcher
    /// produces the 404.
    #[must_use]
    pub fn route(&self, table: &HandlerTable) -> Delegation {
        match table.resolve(self.path()) {
            Resolution::Found { target, rest } => Delegation::with_path(Arc::clone(target), rest),
            Resolution::NotFound => Delegation::to(Arc::new(NotFoundHandler)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_found_handler() {
        let ctx = RequestContext::mock("/missing");
        let err = NotFoundHandler.handle(&ctx).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("/missing"));
    }

    #[test]
    fn test_with_header_appends() {
        let reply = Reply::empty()
            .with_header(http::header::SET_COOKIE, "a=1")
            .and_then(|r| r.with_header(http::header::SET_COOKIE, "b=2"))
            .unwrap();
        assert_eq!(reply.headers().get_all(http::header::SET_COOKIE).iter().count(), 2);
        assert!(Reply::empty().with_header(http::header::SET_COOKIE, "bad\n").is_err());
    }

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = FnHandler::new(|ctx: RequestContext| async move {
            Reply::json(&ctx.path().count()).map(Outcome::from)
        });
        let outcome = handler.handle(&RequestContext::mock("/a/b")).await.unwrap();
        match outcome {
            Outcome::Reply(reply) => assert_eq!(reply.body().as_ref(), b"2"),
            Outcome::Delegate(_) => panic!("expected reply"),
        }
    }

    #[test]
    fn test_route_delegates_with_rest() {
        let leaf: Arc<dyn Handler> = Arc::new(NotFoundHandler);
        let table = HandlerTable::new().nest("site", HandlerTable::new().route("theme", leaf));

        let delegation = RequestContext::mock("/site/theme/edit").route(&table);
        assert_eq!(delegation.path_override.unwrap().path(), "/edit");
    }

    #[test]
    fn test_route_miss_delegates_to_not_found() {
        let table = HandlerTable::new();
        let delegation = RequestContext::mock("/nope").route(&table);
        assert!(delegation.path_override.is_none());
        assert!(delegation.handler.name().contains("NotFoundHandler"));
    }

    #[test]
    fn test_reply_json() {
        let reply = Reply::json(&serde_json::json!({ "ok": true })).unwrap();
        assert_eq!(reply.status_code(), StatusCode::OK);
        assert_eq!(reply.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(reply.body().as_ref(), br#"{"ok":true}"#);
    }

    #[test]
    fn test_reply_redirect() {
        let reply = Reply::redirect(StatusCode::SEE_OTHER, "edit?id=3").unwrap();
        assert_eq!(reply.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(reply.headers()[LOCATION], "edit?id=3");
        assert!(Reply::redirect(StatusCode::FOUND, "bad\nvalue").is_err());
    }
}
