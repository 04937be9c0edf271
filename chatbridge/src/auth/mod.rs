//! Inbound request authentication.
//!
//! Bearer tokens on webhook requests are JWTs signed by the chat platform.
//! Verification keys come from the platform's published JWK set, cached
//! locally and refreshed in the background.

pub mod keyset;
pub mod token;

#[cfg(test)]
pub(crate) mod test_keys;

pub use keyset::{fetch, FetchError, KeySet, KeySetCache, SigningKey};
pub use token::{bearer_token, AuthError, Audience, Claims, TokenVerifier};
