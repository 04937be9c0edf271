//! Bearer token verification against the cached JWK set.
//!
//! A token is accepted only if all of these hold:
//! - it is a three-part JWT whose header names a `kid`
//! - the `kid` is present in the cached key set (no on-demand refetch)
//! - the signature verifies with that key under the header's algorithm
//! - the `aud` claim equals the expected audience exactly
//!
//! Expiry and issuer are not checked.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::keyset::KeySetCache;

/// Why a token was rejected. Callers must not reveal which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("malformed token")]
    MalformedToken,

    #[error("unknown signing key")]
    UnknownKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("audience mismatch")]
    AudienceMismatch,
}

/// The `aud` claim, which RFC 7519 allows as a string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    /// Exact comparison; no prefix or wildcard matching.
    pub fn matches(&self, expected: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Claims read from a verified token.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub aud: Option<Audience>,
}

/// Extract the token from an `Authorization` header value of the form `Bearer <token>`.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() || token.contains(' ') {
        return None;
    }

    Some(token)
}

/// Verifies bearer tokens issued for this service.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: KeySetCache,
}

impl TokenVerifier {
    pub fn new(keys: KeySetCache) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeySetCache {
        &self.keys
    }

    /// Verify `token` and check that it was issued for `expected_audience`.
    pub fn verify(&self, token: &str, expected_audience: &str) -> Result<Claims, AuthError> {
        if token.split('.').count() != 3 {
            return Err(AuthError::MalformedToken);
        }

        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let kid = header.kid.as_deref().ok_or(AuthError::MalformedToken)?;

        let key = self.keys.lookup(kid).ok_or_else(|| {
            debug!(kid = %kid, "token_kid_not_in_key_set");
            AuthError::UnknownKey
        })?;

        if let Some(pinned) = key.algorithm {
            if pinned != header.alg {
                debug!(kid = %kid, alg = ?header.alg, pinned = ?pinned, "token_algorithm_not_allowed");
                return Err(AuthError::InvalidSignature);
            }
        }

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &key.key, &validation).map_err(|e| {
            debug!(kid = %kid, error = %e, "token_decode_failed");
            match e.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::MalformedToken,
                _ => AuthError::InvalidSignature,
            }
        })?;

        match &data.claims.aud {
            Some(aud) if aud.matches(expected_audience) => Ok(data.claims),
            _ => Err(AuthError::AudienceMismatch),
        }
    }
}
