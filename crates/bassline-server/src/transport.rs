//! The HTTP boundary.
//!
//! [`Transport`] turns one `http::Request` into a [`RequestContext`], picks
//! the app serving it from its [`AppMounts`], runs the [`Dispatcher`], and
//! maps the [`Reply`] or [`BasslineError`] back to a response. It knows
//! nothing about sockets, so it can be driven directly in tests.
//!
//! The request timeout bounds reading the body. Dispatch is never cut short,
//! so a handler waiting on a locked row answers with its own
//! `503 Retry-After` instead of being cancelled mid-step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bassline_core::{
    AppMounts, BasslineError, Dispatcher, Handler, PathComponents, Reply, RequestContext,
    RequestId, RequestParts, SiteConfig,
};
use bassline_session::UserDirectory;
use bassline_telemetry::{log_request_complete, log_request_error, log_request_start};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION, RETRY_AFTER};
use http::{HeaderName, HeaderValue, Request, Response, StatusCode, Uri};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;

use crate::auth;
use crate::config::{DEFAULT_MAX_BODY_BYTES, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::ServerConfig;

/// Response body type.
pub type ResponseBody = Full<Bytes>;

/// The HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// Response header carrying the request id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Maps HTTP requests onto the mounted apps' handler trees.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use bassline_core::{FnHandler, Outcome, Reply, SiteConfig};
/// use bassline_server::Transport;
/// use bassline_session::{MemoryStore, StoreDirectory};
/// use http_body_util::Full;
///
/// # tokio_test::block_on(async {
/// let root = Arc::new(FnHandler::new(|_ctx| async { Ok(Outcome::from(Reply::empty())) }));
/// let directory = Arc::new(StoreDirectory::new(Arc::new(MemoryStore::new())));
/// let transport = Transport::new(root, directory, SiteConfig::default());
///
/// let request = http::Request::get("/").body(Full::new(bytes::Bytes::new())).unwrap();
/// let response = transport.handle(request).await;
/// assert_eq!(response.status(), http::StatusCode::OK);
/// assert!(response.headers().contains_key("x-request-id"));
/// # });
/// ```
pub struct Transport {
    mounts: AppMounts,
    directory: Arc<dyn UserDirectory>,
    site: Arc<SiteConfig>,
    max_body_bytes: usize,
    request_timeout: Duration,
}

impl Transport {
    /// Creates a transport where `root` serves every path.
    #[must_use]
    pub fn new(root: Arc<dyn Handler>, directory: Arc<dyn UserDirectory>, site: SiteConfig) -> Self {
        Self::mounted(AppMounts::new(root), directory, site)
    }

    /// Creates a transport over mounted apps, with default limits.
    #[must_use]
    pub fn mounted(mounts: AppMounts, directory: Arc<dyn UserDirectory>, site: SiteConfig) -> Self {
        Self {
            mounts,
            directory,
            site: Arc::new(site),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Applies the body limit and body read timeout from `config`.
    #[must_use]
    pub fn with_limits(mut self, config: &ServerConfig) -> Self {
        self.max_body_bytes = config.max_body_bytes();
        self.request_timeout = config.request_timeout();
        self
    }

    /// Returns the site settings shared by every request.
    #[must_use]
    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Handles one request. Never fails; errors become error responses.
    pub async fn handle<B>(&self, request: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = Instant::now();
        let _in_flight = bassline_telemetry::InFlightGuard::new();
        let request_id = RequestId::new();
        log_request_start!(request_id, request.method(), request.uri().path());

        let (parts, body) = request.into_parts();
        let mut response = if let Some(reply) = directory_redirect(&parts.uri) {
            reply_response(reply)
        } else {
            match tokio::time::timeout(self.request_timeout, collect_body(body, self.max_body_bytes)).await {
                Err(_) => {
                    tracing::warn!(request_id = %request_id, timeout = ?self.request_timeout, "request body timed out");
                    timeout_response(request_id)
                }
                Ok(Err(err)) => error_response(&err, request_id),
                Ok(Ok(body)) => match self.respond(parts, body, request_id).await {
                    Ok(reply) => reply_response(reply),
                    Err(err) => error_response(&err, request_id),
                },
            }
        };

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let status = response.status().as_u16();
        let elapsed = started.elapsed();
        bassline_telemetry::record_request(status, elapsed);
        log_request_complete!(request_id, status, elapsed.as_millis() as u64);
        response
    }

    async fn respond(
        &self,
        parts: http::request::Parts,
        body: Bytes,
        request_id: RequestId,
    ) -> Result<Reply, BasslineError> {
        let user = auth::authenticate(self.directory.as_ref(), &parts.headers).await;

        let request_parts = RequestParts {
            method: parts.method,
            query: parts.uri.query().unwrap_or_default().to_string(),
            headers: parts.headers,
            body,
        };

        let request_path = PathComponents::from_uri(&parts.uri);
        let selection = self.mounts.select(&request_path);
        let mut ctx = RequestContext::new(request_path, Arc::clone(&self.site), request_parts)
            .with_request_id(request_id)
            .with_path(selection.path)
            .with_app(selection.app_key);
        if let Some(user) = user {
            tracing::debug!(request_id = %request_id, user = %user.log_id(), "authenticated");
            ctx = ctx.with_user(user);
        }

        Dispatcher::new(selection.handler).dispatch(ctx).await
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("mounts", &self.mounts)
            .field("site", &self.site)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// A one-segment path without a trailing slash names an application
/// directory; answer with a permanent redirect to the slash form.
fn directory_redirect(uri: &Uri) -> Option<Reply> {
    let path = PathComponents::from_uri(uri);
    if path.count() != 1 || path.is_dir() {
        return None;
    }

    let mut location = format!("{}/", uri.path());
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }
    Reply::redirect(StatusCode::MOVED_PERMANENTLY, &location).ok()
}

async fn collect_body<B>(body: B, limit: usize) -> Result<Bytes, BasslineError>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(BasslineError::validation(
            format!("request body exceeds {limit} bytes"),
        )),
        Err(e) => Err(BasslineError::validation(format!("failed to read request body: {e}"))),
    }
}

fn reply_response(reply: Reply) -> HttpResponse {
    let (status, headers, body) = reply.into_parts();
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Renders an error as its JSON envelope.
///
/// Storage contention adds a `Retry-After` header.
pub fn error_response(err: &BasslineError, request_id: RequestId) -> HttpResponse {
    let status = err.status_code();
    if status.is_server_error() {
        log_request_error!(request_id, err);
        if let BasslineError::Internal {
            source: Some(source),
            ..
        } = err
        {
            tracing::error!(request_id = %request_id, source = ?source, "internal error source");
        }
    } else {
        tracing::debug!(request_id = %request_id, status = status.as_u16(), error = %err, "request rejected");
    }

    let envelope = err.to_envelope(Some(&request_id.to_string()));
    let body = serde_json::to_vec(&envelope).unwrap_or_else(|_| {
        br#"{"error":{"code":"INTERNAL_ERROR","message":"Internal server error","category":"internal"}}"#.to_vec()
    });

    let mut response = json_response(status, body);
    if let Some(seconds) = err.retry_after() {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(seconds));
    }
    response
}

fn timeout_response(request_id: RequestId) -> HttpResponse {
    let body = serde_json::json!({
        "error": {
            "code": "REQUEST_TIMEOUT",
            "message": "Request body was not received in time",
            "category": "validation"
        },
        "request_id": request_id.to_string()
    });
    json_response(StatusCode::REQUEST_TIMEOUT, body.to_string().into_bytes())
}

fn json_response(status: StatusCode, body: Vec<u8>) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Returns the `Location` header of a response, if any.
#[must_use]
pub fn location(response: &HttpResponse) -> Option<&str> {
    response.headers().get(LOCATION)?.to_str().ok()
}
