//! Locally cached copy of the signer's JWK set.
//!
//! The set is fetched once before the server starts accepting traffic and
//! then refreshed on a fixed timer. Lookups on the request path only read
//! the cached set, so authentication never waits on the key endpoint.
//! A failed refresh keeps serving the previous set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::util::PeriodicTask;

/// Failure to retrieve a usable key set.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("key set request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("key set endpoint returned status {0}")]
    Status(StatusCode),

    #[error("invalid key set document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("key set contains no usable signing keys")]
    NoUsableKeys,
}

/// Verification key for one `kid`.
#[derive(Clone)]
pub struct SigningKey {
    pub key: DecodingKey,
    /// Algorithm pinned by the JWK's `alg` member, if any.
    pub algorithm: Option<Algorithm>,
}

/// Immutable snapshot of a JWK set, indexed by key identifier.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, SigningKey>,
}

impl KeySet {
    /// Build from a decoded JWK set.
    ///
    /// Keys without a `kid`, keys meant for encryption, and keys whose
    /// parameters cannot be used for verification are skipped.
    pub fn from_jwks(set: &JwkSet) -> Self {
        let mut keys = HashMap::with_capacity(set.keys.len());

        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                warn!("jwk_missing_kid");
                continue;
            };

            match signing_key(jwk) {
                Some(key) => {
                    keys.insert(kid, key);
                }
                None => warn!(kid = %kid, "jwk_unusable"),
            }
        }

        Self { keys }
    }

    /// Build from the raw `keys` array of a JWK set document.
    ///
    /// Entries that do not decode as a JWK (unknown `kty` or `alg`, missing
    /// parameters) are skipped instead of failing the whole set.
    pub fn from_json_keys(values: Vec<Value>) -> Self {
        let mut keys = Vec::with_capacity(values.len());

        for value in values {
            let kid = value
                .get("kid")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            match serde_json::from_value::<Jwk>(value) {
                Ok(jwk) => keys.push(jwk),
                Err(e) => warn!(kid = %kid, error = %e, "jwk_unusable"),
            }
        }

        Self::from_jwks(&JwkSet { keys })
    }

    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn signing_key(jwk: &Jwk) -> Option<SigningKey> {
    let algorithm = match &jwk.common.key_algorithm {
        Some(alg) => Some(signature_algorithm(alg)?),
        None => None,
    };
    let key = DecodingKey::from_jwk(jwk).ok()?;

    Some(SigningKey { key, algorithm })
}

/// Map a JWK `alg` to a signature algorithm. Encryption algorithms map to `None`.
fn signature_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// JWK set document with its keys left undecoded.
#[derive(Deserialize)]
struct JwkSetDocument {
    keys: Vec<Value>,
}

/// Retrieve and decode the JWK set at `url`.
pub async fn fetch(http: &Client, url: &str) -> Result<KeySet, FetchError> {
    let resp = http.get(url).send().await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let body = resp.bytes().await?;
    let document: JwkSetDocument = serde_json::from_slice(&body)?;
    let keys = KeySet::from_json_keys(document.keys);

    if keys.is_empty() {
        return Err(FetchError::NoUsableKeys);
    }

    Ok(keys)
}

/// Shared, periodically refreshed key set.
#[derive(Clone)]
pub struct KeySetCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    http: Client,
    url: String,
    keys: RwLock<Arc<KeySet>>,
}

impl KeySetCache {
    /// Fetch the key set at `url` and build a cache around it.
    ///
    /// Fails if the initial fetch fails: without keys no request can be
    /// authenticated.
    pub async fn load(http: Client, url: impl Into<String>) -> Result<Self, FetchError> {
        let url = url.into();
        info!(url = %url, "jwks_initial_fetch_starting");

        let keys = fetch(&http, &url).await?;
        info!(url = %url, key_count = keys.len(), "jwks_initial_fetch_complete");

        Ok(Self::with_keys(http, url, keys))
    }

    /// Build a cache around an already fetched key set.
    pub fn with_keys(http: Client, url: impl Into<String>, keys: KeySet) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                http,
                url: url.into(),
                keys: RwLock::new(Arc::new(keys)),
            }),
        }
    }

    /// Re-fetch the key set and swap it in. Returns the new key count.
    ///
    /// On failure the previous key set stays in place.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        match fetch(&self.inner.http, &self.inner.url).await {
            Ok(keys) => {
                let count = keys.len();
                *self.inner.keys.write() = Arc::new(keys);
                info!(url = %self.inner.url, key_count = count, "jwks_refreshed");
                Ok(count)
            }
            Err(e) => {
                warn!(
                    url = %self.inner.url,
                    error = %e,
                    retained_key_count = self.len(),
                    "jwks_refresh_failed"
                );
                Err(e)
            }
        }
    }

    /// Refresh every `interval` until the returned task is stopped.
    pub fn spawn_refresh(&self, interval: Duration) -> PeriodicTask {
        let cache = self.clone();
        PeriodicTask::spawn("jwks_refresher", interval, move || {
            let cache = cache.clone();
            async move {
                cache.refresh().await.ok();
            }
        })
    }

    /// Key published under `kid` in the current snapshot. Never touches the network.
    pub fn lookup(&self, kid: &str) -> Option<SigningKey> {
        let keys = Arc::clone(&self.inner.keys.read());
        keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.keys.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_keys::{jwks_json, test_jwk, TEST_KID};
    use httpmock::prelude::*;
    use serde_json::json;

    fn jwk_set(value: serde_json::Value) -> JwkSet {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_from_jwks_indexes_by_kid() {
        let set = jwk_set(json!({ "keys": [test_jwk("a"), test_jwk("b")] }));
        let keys = KeySet::from_jwks(&set);

        assert_eq!(keys.len(), 2);
        assert!(keys.get("a").is_some());
        assert_eq!(keys.get("b").unwrap().algorithm, Some(Algorithm::RS256));
        assert!(keys.get("c").is_none());
    }

    #[test]
    fn test_from_jwks_skips_keys_without_kid() {
        let mut anonymous = test_jwk("x");
        anonymous.as_object_mut().unwrap().remove("kid");
        let set = jwk_set(json!({ "keys": [anonymous, test_jwk("a")] }));

        let keys = KeySet::from_jwks(&set);

        assert_eq!(keys.len(), 1);
        assert!(keys.get("a").is_some());
    }

    #[test]
    fn test_from_jwks_skips_encryption_keys() {
        let mut enc = test_jwk("enc");
        enc["alg"] = json!("RSA-OAEP");
        enc["use"] = json!("enc");
        let set = jwk_set(json!({ "keys": [enc] }));

        assert!(KeySet::from_jwks(&set).is_empty());
    }

    #[test]
    fn test_from_json_keys_skips_undecodable_keys() {
        let mut unknown_alg = test_jwk("oaep-384");
        unknown_alg["alg"] = json!("RSA-OAEP-384");
        let unknown_kty = json!({ "kty": "AKP", "alg": "ML-DSA-44", "kid": "pq", "pub": "AAAA" });

        let keys = KeySet::from_json_keys(vec![unknown_alg, test_jwk(TEST_KID), unknown_kty, json!("junk")]);

        assert_eq!(keys.len(), 1);
        assert!(keys.get(TEST_KID).is_some());
    }

    #[tokio::test]
    async fn test_load_keeps_usable_keys_next_to_unknown_ones() {
        let server = MockServer::start_async().await;
        let mut unknown_alg = test_jwk("oaep-384");
        unknown_alg["alg"] = json!("RSA-OAEP-384");
        let body = json!({
            "keys": [test_jwk(TEST_KID), unknown_alg, { "kty": "AKP", "alg": "ML-DSA-44", "kid": "pq" }]
        });
        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwk");
                then.status(200).json_body(body);
            })
            .await;

        let cache = KeySetCache::load(Client::new(), server.url("/jwk")).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(TEST_KID).is_some());
    }

    #[tokio::test]
    async fn test_load_fetches_keys() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/jwk");
                then.status(200).body(jwks_json(&[TEST_KID]));
            })
            .await;

        let cache = KeySetCache::load(Client::new(), server.url("/jwk")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(TEST_KID).is_some());
        assert!(cache.lookup("missing").is_none());
    }

    #[tokio::test]
    async fn test_load_fails_on_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwk");
                then.status(503);
            })
            .await;

        let result = KeySetCache::load(Client::new(), server.url("/jwk")).await;

        assert!(matches!(result, Err(FetchError::Status(s)) if s == StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_load_fails_on_invalid_document() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwk");
                then.status(200).body("<html>nope</html>");
            })
            .await;

        let result = fetch(&Client::new(), &server.url("/jwk")).await;

        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_load_fails_on_empty_set() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwk");
                then.status(200).body(r#"{"keys":[]}"#);
            })
            .await;

        let result = fetch(&Client::new(), &server.url("/jwk")).await;

        assert!(matches!(result, Err(FetchError::NoUsableKeys)));
    }

    #[tokio::test]
    async fn test_refresh_swaps_in_rotated_keys() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET).path("/jwk");
                then.status(200).body(jwks_json(&["old"]));
            })
            .await;

        let cache = KeySetCache::load(Client::new(), server.url("/jwk")).await.unwrap();
        first.delete_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwk");
                then.status(200).body(jwks_json(&["new", "newer"]));
            })
            .await;

        assert_eq!(cache.refresh().await.unwrap(), 2);
        assert!(cache.lookup("old").is_none());
        assert!(cache.lookup("new").is_some());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_keys() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET).path("/jwk");
                then.status(200).body(jwks_json(&[TEST_KID]));
            })
            .await;

        let cache = KeySetCache::load(Client::new(), server.url("/jwk")).await.unwrap();
        first.delete_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwk");
                then.status(500);
            })
            .await;

        assert!(cache.refresh().await.is_err());
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(TEST_KID).is_some());
    }

    #[tokio::test]
    async fn test_lookup_does_not_fetch() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/jwk");
                then.status(200).body(jwks_json(&[TEST_KID]));
            })
            .await;

        let cache = KeySetCache::load(Client::new(), server.url("/jwk")).await.unwrap();
        for _ in 0..10 {
            assert!(cache.lookup("unknown").is_none());
        }

        assert_eq!(mock.hits_async().await, 1);
    }
}
