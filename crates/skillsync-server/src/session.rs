//! Request-side session resolution.
//!
//! Every failure, whether the token is absent, malformed, forged or
//! expired, surfaces as [`ApiError::Unauthenticated`]. The concrete reason
//! is only logged.

use axum::http::{header, HeaderMap};
use chrono::Utc;
use tracing::debug;

use skillsync_shared::constants::SESSION_COOKIE_NAME;
use skillsync_shared::session::{verify_session_token, SessionSecret};
use skillsync_shared::{Principal, SessionError};

use crate::error::ApiError;

#[derive(Clone)]
pub struct SessionResolver {
    secret: SessionSecret,
}

impl SessionResolver {
    pub fn new(secret: SessionSecret) -> Self {
        Self { secret }
    }

    /// Verify candidate tokens in order and yield the caller of the first
    /// one that checks out.
    pub fn resolve<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a str>,
    ) -> Result<Principal, ApiError> {
        let now = Utc::now();
        let mut reason = SessionError::Missing;
        for token in candidates {
            match verify_session_token(token, &self.secret, now) {
                Ok(principal) => return Ok(principal),
                Err(e) => reason = e,
            }
        }
        debug!(%reason, "session rejected");
        Err(ApiError::Unauthenticated)
    }

    /// Resolve the session carried by a request's headers.
    ///
    /// The cookie is tried first. A cookie that fails to verify does not
    /// hide a valid bearer token.
    pub fn resolve_headers(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        self.resolve(session_tokens(headers))
    }
}

/// Candidate session tokens in the order they are tried: the `token`
/// cookie, then a bearer `Authorization` header.
pub fn session_tokens(headers: &HeaderMap) -> Vec<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    cookie_value(headers, SESSION_COOKIE_NAME)
        .into_iter()
        .chain(bearer)
        .collect()
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value that removes the session cookie.
pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE_NAME}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Duration;
    use skillsync_shared::session::{generate_session_secret, issue_session_token};

    fn alice() -> Principal {
        Principal::new("u-a", "a@x.com", "Alice")
    }

    #[test]
    fn resolves_cookie_token() {
        let secret = generate_session_secret();
        let token = issue_session_token(&alice(), &secret, Utc::now(), Duration::days(7));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; token={token}; lang=en")).unwrap(),
        );

        let resolver = SessionResolver::new(secret);
        assert_eq!(resolver.resolve_headers(&headers).unwrap(), alice());
    }

    #[test]
    fn resolves_bearer_token() {
        let secret = generate_session_secret();
        let token = issue_session_token(&alice(), &secret, Utc::now(), Duration::days(7));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let resolver = SessionResolver::new(secret);
        assert_eq!(resolver.resolve_headers(&headers).unwrap(), alice());
    }

    #[test]
    fn every_failure_looks_the_same() {
        let secret = generate_session_secret();
        let resolver = SessionResolver::new(secret);
        let expired = issue_session_token(
            &alice(),
            &secret,
            Utc::now() - Duration::days(30),
            Duration::days(7),
        );
        let foreign = issue_session_token(
            &alice(),
            &generate_session_secret(),
            Utc::now(),
            Duration::days(7),
        );

        for token in [None, Some("garbage"), Some(expired.as_str()), Some(foreign.as_str())] {
            assert!(matches!(
                resolver.resolve(token),
                Err(ApiError::Unauthenticated)
            ));
        }
    }

    #[test]
    fn empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert!(session_tokens(&headers).is_empty());
    }

    #[test]
    fn stale_cookie_falls_back_to_bearer() {
        let secret = generate_session_secret();
        let fresh = issue_session_token(&alice(), &secret, Utc::now(), Duration::days(7));
        let stale = issue_session_token(
            &alice(),
            &secret,
            Utc::now() - Duration::days(30),
            Duration::days(7),
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("token={stale}")).unwrap(),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {fresh}")).unwrap(),
        );
        assert_eq!(session_tokens(&headers), vec![stale.as_str(), fresh.as_str()]);

        let resolver = SessionResolver::new(secret);
        assert_eq!(resolver.resolve_headers(&headers).unwrap(), alice());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));
        assert!(matches!(
            resolver.resolve_headers(&headers),
            Err(ApiError::Unauthenticated)
        ));
    }

    #[test]
    fn expired_cookie_clears_token() {
        let cookie = expired_session_cookie();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("HttpOnly"));
    }
}
