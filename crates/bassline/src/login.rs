//! Sign-in and sign-out.
//!
//! ```text
//! GET  /login/                                    enabled sign-in methods
//! POST /login/attempt?auth=KEY&redirect_uri=PATH  sign in, set the cookie
//! ANY  /logout/                                   end the login, clear it
//! ```
//!
//! Two methods are built in. `noauth` signs in as any existing user by id
//! (`user-id`) and is switched by the auth config's `noauthEnabled`;
//! `nonce` redeems a single-use nonce from `bassline --issue-nonce`. Both
//! read their input from a form body or the query string.

use std::sync::Arc;

use async_trait::async_trait;
use bassline_core::{
    BasslineError, BasslineResult, ErrorCategory, Handler, Outcome, Reply, RequestContext, UserId,
};
use bassline_server::auth::{cookie_value, LOGIN_COOKIE};
use bassline_session::{EditSession, ResourceKey, ResourceKind, ResourceStore, UserDirectory};
use http::header::{CACHE_CONTROL, SET_COOKIE};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::editor::require_post;

/// Lifetime of a login cookie.
pub const LOGIN_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// The built-in sign-in methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    /// Pick any user; for development sites.
    NoAuth,
    /// Redeem a nonce issued from the command line.
    Nonce,
}

impl LoginMethod {
    /// Every method, in display order.
    pub const ALL: [Self; 2] = [Self::NoAuth, Self::Nonce];

    /// The `auth` query value selecting this method.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::NoAuth => "noauth",
            Self::Nonce => "nonce",
        }
    }

    /// Display title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::NoAuth => "No Auth",
            Self::Nonce => "Nonce",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.key() == key)
    }
}

/// Returns `redirect` if it is a path on this site, otherwise `/`.
#[must_use]
pub fn local_redirect(redirect: Option<&str>) -> &str {
    match redirect {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path,
        _ => "/",
    }
}

fn login_cookie(token: &str) -> String {
    format!("{LOGIN_COOKIE}={token}; Path=/; Max-Age={LOGIN_MAX_AGE_SECS}; HttpOnly; SameSite=Strict")
}

fn cleared_cookie() -> String {
    format!("{LOGIN_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict")
}

/// Shared state of the login routes.
#[derive(Clone)]
struct Logins {
    store: Arc<dyn ResourceStore>,
    directory: Arc<dyn UserDirectory>,
}

impl Logins {
    fn new(session: &EditSession) -> Self {
        Self {
            store: Arc::clone(session.store()),
            directory: Arc::clone(session.directory()),
        }
    }

    async fn enabled(&self, method: LoginMethod) -> BasslineResult<bool> {
        match method {
            LoginMethod::Nonce => Ok(true),
            LoginMethod::NoAuth => {
                let config = self.store.read(ResourceKey::auth_config()).await?;
                Ok(config
                    .as_ref()
                    .and_then(|fields| fields.get("noauthEnabled"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false))
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    redirect_uri: Option<String>,
}

/// `GET /login/`: the enabled sign-in methods and where each posts to.
pub struct LoginPage {
    logins: Logins,
}

impl LoginPage {
    /// Creates the page over `session`'s store and directory.
    #[must_use]
    pub fn new(session: &EditSession) -> Self {
        Self {
            logins: Logins::new(session),
        }
    }
}

#[async_trait]
impl Handler for LoginPage {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        let query: LoginQuery = ctx.request().query_params()?;
        let redirect = local_redirect(query.redirect_uri.as_deref());

        let mut methods = Vec::new();
        for method in LoginMethod::ALL {
            if !self.logins.enabled(method).await? {
                continue;
            }
            let attempt = serde_urlencoded::to_string([("auth", method.key()), ("redirect_uri", redirect)])
                .map_err(|e| BasslineError::internal_with_source("failed to encode login uri", e))?;
            let mut entry = json!({
                "key": method.key(),
                "title": method.title(),
                "attempt": format!("/login/attempt?{attempt}"),
            });
            if method == LoginMethod::NoAuth {
                let users: Vec<Value> = self
                    .logins
                    .store
                    .list(ResourceKind::User)
                    .await?
                    .into_iter()
                    .map(|record| json!({ "id": record.key.id, "username": record.fields.get("username") }))
                    .collect();
                entry["users"] = Value::Array(users);
            }
            methods.push(entry);
        }

        Ok(Reply::json(&json!({ "methods": methods }))?.into())
    }

    fn name(&self) -> &'static str {
        "login"
    }
}

#[derive(Debug, Default, Deserialize)]
struct AttemptParams {
    auth: Option<String>,
    redirect_uri: Option<String>,
    #[serde(rename = "user-id")]
    user_id: Option<String>,
    nonce: Option<String>,
}

/// `POST /login/attempt`: signs in and redirects back.
///
/// A failed attempt redirects without a cookie; an unknown or disabled
/// method is a 404.
pub struct LoginAttempt {
    logins: Logins,
}

impl LoginAttempt {
    /// Creates the handler over `session`'s store and directory.
    #[must_use]
    pub fn new(session: &EditSession) -> Self {
        Self {
            logins: Logins::new(session),
        }
    }

    async fn authenticate(&self, method: LoginMethod, params: &AttemptParams) -> Option<UserId> {
        match method {
            LoginMethod::NoAuth => params.user_id.as_deref()?.trim().parse().ok(),
            LoginMethod::Nonce => self.logins.directory.redeem_nonce(params.nonce.as_deref()?).await,
        }
    }
}

#[async_trait]
impl Handler for LoginAttempt {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        if !ctx.path().is_root() {
            return Err(BasslineError::not_found(ctx.request_path().path()));
        }
        require_post(ctx, "login")?;

        let params: AttemptParams = ctx.request().form_params()?;
        let query: AttemptParams = ctx.request().query_params()?;
        let key = query.auth.as_deref().or(params.auth.as_deref()).unwrap_or_default();
        let unknown = || BasslineError::not_found(format!("login method '{key}'"));
        let method = LoginMethod::from_key(key).ok_or_else(unknown)?;
        if !self.logins.enabled(method).await? {
            return Err(unknown());
        }
        let redirect = local_redirect(query.redirect_uri.as_deref().or(params.redirect_uri.as_deref()));

        let Some(user_id) = self.authenticate(method, &params).await else {
            debug!(request_id = %ctx.request_id(), method = method.key(), "login failed");
            return Ok(Reply::redirect(StatusCode::SEE_OTHER, redirect)?.into());
        };

        let token = match self.logins.directory.login(user_id).await {
            Ok(token) => token,
            Err(e) if e.category() == ErrorCategory::NotFound => {
                debug!(request_id = %ctx.request_id(), user_id, "login for unknown user");
                return Ok(Reply::redirect(StatusCode::SEE_OTHER, redirect)?.into());
            }
            Err(e) => return Err(e),
        };
        info!(request_id = %ctx.request_id(), method = method.key(), user_id, "logged in");

        Ok(Reply::redirect(StatusCode::SEE_OTHER, redirect)?
            .with_header(SET_COOKIE, &login_cookie(&token))?
            .into())
    }

    fn name(&self) -> &'static str {
        "login_attempt"
    }
}

/// `/logout/`: ends the caller's login and clears the cookie.
pub struct Logout {
    directory: Arc<dyn UserDirectory>,
}

impl Logout {
    /// Creates the handler over `session`'s directory.
    #[must_use]
    pub fn new(session: &EditSession) -> Self {
        Self {
            directory: Arc::clone(session.directory()),
        }
    }
}

#[async_trait]
impl Handler for Logout {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        if let Some(token) = cookie_value(&ctx.request().headers, LOGIN_COOKIE) {
            self.directory.logout(token).await;
        }
        if let Some(user) = ctx.user() {
            info!(request_id = %ctx.request_id(), user = %user.log_id(), "logged out");
        }

        Ok(Reply::redirect(StatusCode::SEE_OTHER, "/")?
            .with_header(SET_COOKIE, &cleared_cookie())?
            .with_header(CACHE_CONTROL, "no-store")?
            .into())
    }

    fn name(&self) -> &'static str {
        "logout"
    }
}
