//! Bearer-token authentication for the dashboard API.
//!
//! Every `/api` route except the Telegram webhook goes through
//! [`auth_middleware`]. There are no default credentials: the process does
//! not start without `DASHBOARD_TOKEN`.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::error::ApiError;
use super::AppState;

/// Decides whether a presented credential is valid.
pub trait Authenticator: Send + Sync {
    fn verify(&self, token: &str) -> bool;
}

/// Accepts exactly one configured token.
///
/// Only the SHA-256 digest of the token is kept. Candidates are hashed and
/// compared in constant time, so the comparison does not depend on length.
pub struct StaticTokenAuthenticator {
    digest: [u8; 32],
}

impl StaticTokenAuthenticator {
    pub fn new(token: &str) -> Self {
        Self { digest: digest(token) }
    }
}

impl std::fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuthenticator")
            .field("digest", &"[redacted]")
            .finish()
    }
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

impl Authenticator for StaticTokenAuthenticator {
    fn verify(&self, token: &str) -> bool {
        digest(token)[..].ct_eq(&self.digest[..]).into()
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Rejects requests without a valid bearer token with 401.
pub async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = bearer_token(&request).is_some_and(|token| state.auth.verify(token));
    if authorized {
        next.run(request).await
    } else {
        log::debug!("Rejected unauthenticated request to {}", request.uri().path());
        ApiError::Unauthorized.into_response()
    }
}
