//! Login-cookie authentication.
//!
//! The shell's login routes issue the `login` cookie; the transport resolves
//! its value through the [`UserDirectory`] on every request. An unknown or
//! missing cookie leaves the request anonymous, and handlers that need a
//! user answer 401.

use bassline_core::AuthenticatedUser;
use bassline_session::UserDirectory;
use http::header::COOKIE;
use http::HeaderMap;

/// Name of the session cookie.
pub const LOGIN_COOKIE: &str = "login";

/// Returns the value of cookie `name` from the `Cookie` headers.
///
/// ```rust
/// use bassline_server::auth::cookie_value;
/// use http::{header::COOKIE, HeaderMap, HeaderValue};
///
/// let mut headers = HeaderMap::new();
/// headers.insert(COOKIE, HeaderValue::from_static("theme=dark; login=\"abc\""));
/// assert_eq!(cookie_value(&headers, "login"), Some("abc"));
/// ```
#[must_use]
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
}

/// Resolves the request's user from its `login` cookie.
pub async fn authenticate(
    directory: &dyn UserDirectory,
    headers: &HeaderMap,
) -> Option<AuthenticatedUser> {
    let cookie = cookie_value(headers, LOGIN_COOKIE).filter(|value| !value.is_empty())?;
    let user = directory.resolve_login(cookie).await;
    if user.is_none() {
        tracing::debug!("login cookie did not resolve to a user");
    }
    user
}
