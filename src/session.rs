//! Anonymous session identity.
//!
//! A session token is an opaque label a client holds on to so that the rows
//! it creates (posts, comments, votes) can be attributed to "the same
//! browser". It is not an account and it authorizes nothing.

use std::fmt;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// Header API clients can use instead of the cookie.
pub const SESSION_HEADER: &str = "x-session-token";

const MAX_TOKEN_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Mint a fresh random token: 32 random bytes, hex encoded.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    /// Accept a client-supplied token if it is usable as a label.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_TOKEN_LEN {
            return None;
        }
        if !raw.chars().all(|c| c.is_ascii_graphic() && c != ';' && c != ',') {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Middleware that guarantees every request carries a session token.
///
/// Looks at the `x-session-token` header first, then the session cookie. When
/// neither yields a usable token a new one is minted and handed back to the
/// client through `Set-Cookie`.
pub async fn ensure_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let cookie_name = state.config.session.cookie_name.as_str();

    let (token, minted) = match token_from_headers(req.headers(), cookie_name) {
        Some(token) => (token, false),
        None => (SessionToken::generate(), true),
    };

    req.extensions_mut().insert(token.clone());
    let mut response = next.run(req).await;

    if minted {
        let cookie = session_cookie(cookie_name, &token, state.config.session.max_age_days);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Could not encode session cookie: {}", e),
        }
    }

    response
}

fn session_cookie(name: &str, token: &SessionToken, max_age_days: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name,
        token,
        max_age_days.saturating_mul(24 * 60 * 60)
    )
}

fn token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<SessionToken> {
    if let Some(token) = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(SessionToken::parse)
    {
        return Some(token);
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name {
                SessionToken::parse(val)
            } else {
                None
            }
        })
}

/// Extractor for the token placed by [`ensure_session`].
#[derive(Debug, Clone)]
pub struct Session(pub SessionToken);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionToken>()
            .cloned()
            .map(Session)
            .ok_or_else(|| AppError::Internal("Session middleware is not installed".into()))
    }
}
