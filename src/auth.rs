use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    config::AppConfig,
    gate::{TOKEN_PREFIX, is_valid_token},
    session::{CookieSession, SessionStore},
};

/// Claims
///
/// Payload expected inside a backend-issued JWT when strict verification is enabled.
/// Only `exp` is enforced; the subject is carried for logging.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
}

/// TokenVerifier
///
/// Decides whether a cookie value counts as a valid session token. The gate only asks
/// this question; it never inspects the token itself.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> bool;
}

/// BearerPrefix
///
/// The default verifier: syntactic `"Bearer "` prefix check, nothing more.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerPrefix;

impl TokenVerifier for BearerPrefix {
    fn verify(&self, token: &str) -> bool {
        is_valid_token(token)
    }
}

/// JwtVerifier
///
/// Strict verifier used when `TOKEN_SECRET` is configured. The token must still carry the
/// `"Bearer "` prefix, and the remainder must be an HS256 JWT signed with the shared secret
/// and not yet expired.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> bool {
        let Some(jwt) = token.strip_prefix(TOKEN_PREFIX) else {
            return false;
        };

        match decode::<Claims>(jwt, &self.key, &self.validation) {
            Ok(data) => {
                tracing::trace!(sub = %data.claims.sub, "session token verified");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "session token rejected");
                false
            }
        }
    }
}

/// VerifierState
///
/// Shared handle to the configured verifier.
pub type VerifierState = Arc<dyn TokenVerifier>;

/// verifier_for
///
/// Picks the strict verifier when a secret is configured, the prefix check otherwise.
pub fn verifier_for(config: &AppConfig) -> VerifierState {
    match config.token_secret.as_deref() {
        Some(secret) if !secret.is_empty() => Arc::new(JwtVerifier::new(secret)),
        _ => Arc::new(BearerPrefix),
    }
}

/// SessionToken Extractor
///
/// The raw `token` cookie value, forwarded verbatim as the `Authorization` header on
/// backend calls. Handlers behind the gate take this to talk to the backend on the
/// user's behalf.
///
/// Rejection: `401 Unauthorized` when the cookie is missing or not `"Bearer "`-prefixed.
/// With the default route table the gate has already redirected such requests, so this
/// only fires for routes that a custom table leaves open.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = CookieSession::from_request_parts(parts, state)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        session
            .read_token()
            .filter(|token| is_valid_token(token))
            .map(SessionToken)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
