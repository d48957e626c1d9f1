//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! Keys are discovered through the API server's OIDC document and cached as
//! immutable generations. A refresh builds a complete new generation and swaps
//! it in under the write lock, so readers see either the old key set or the
//! new one in full.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::cluster::ClusterConfig;
use crate::error::{AuthError, Result};
use crate::jwt::{decode_base64url, RS256};
use crate::signature::{KeyError, RsaPublicKey};

/// OIDC discovery document fields the engine reads.
#[derive(Debug, Deserialize)]
pub struct DiscoveryDocument {
    /// Issuer advertised by the API server.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Location of the key set.
    pub jwks_uri: String,
}

/// JWKS response from the API server.
///
/// Entries stay untyped so one malformed key does not discard the set.
#[derive(Debug, Deserialize)]
pub struct JwksResponse {
    /// The list of keys.
    pub keys: Vec<serde_json::Value>,
}

/// A single JWK (JSON Web Key).
#[derive(Debug, Deserialize)]
pub struct JwkKey {
    /// Key type (e.g., "RSA").
    pub kty: String,
    /// Key ID.
    #[serde(default)]
    pub kid: Option<String>,
    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,
    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
    /// Key use (e.g., "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    /// Algorithm (e.g., `RS256`).
    #[serde(default)]
    pub alg: Option<String>,
}

/// Convert a JWK into a verification key.
///
/// Returns `Ok(None)` for keys the engine does not use: non-RSA key types,
/// keys without a `kid`, encryption keys, and keys pinned to another algorithm.
///
/// # Errors
///
/// Returns a `KeyError` for RSA keys with missing or invalid material.
pub fn parse_key(key: &JwkKey) -> std::result::Result<Option<RsaPublicKey>, KeyError> {
    if key.kty != "RSA" {
        tracing::debug!(kty = %key.kty, kid = ?key.kid, "Skipping non-RSA key");
        return Ok(None);
    }
    if key.kid.is_none() {
        tracing::debug!("Skipping RSA key without kid");
        return Ok(None);
    }
    if key.key_use.as_deref().is_some_and(|u| u != "sig") {
        tracing::debug!(kid = ?key.kid, key_use = ?key.key_use, "Skipping non-signing key");
        return Ok(None);
    }
    if key.alg.as_deref().is_some_and(|alg| alg != RS256) {
        tracing::debug!(kid = ?key.kid, alg = ?key.alg, "Skipping key for other algorithm");
        return Ok(None);
    }

    let n = decode_member("n", key.n.as_deref())?;
    let e = decode_member("e", key.e.as_deref())?;
    RsaPublicKey::from_components(&n, &e).map(Some)
}

fn decode_member(member: &'static str, value: Option<&str>) -> std::result::Result<Vec<u8>, KeyError> {
    let value = value.ok_or(KeyError::MissingMember(member))?;
    decode_base64url(value).map_err(|e| KeyError::Encoding {
        member,
        reason: e.to_string(),
    })
}

/// One complete fetch of a cluster's key set.
#[derive(Debug)]
pub struct KeyGeneration {
    keys: HashMap<String, Arc<RsaPublicKey>>,
    cached_at: Instant,
}

impl KeyGeneration {
    /// Build a generation from parsed keys, stamped now.
    #[must_use]
    pub fn new(keys: HashMap<String, Arc<RsaPublicKey>>) -> Self {
        Self {
            keys,
            cached_at: Instant::now(),
        }
    }

    /// Build a generation from a JWKS document, skipping unusable entries.
    #[must_use]
    pub fn from_response(response: JwksResponse) -> Self {
        let mut keys = HashMap::new();
        for entry in response.keys {
            let jwk: JwkKey = match serde_json::from_value(entry) {
                Ok(jwk) => jwk,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed JWK");
                    continue;
                }
            };
            match parse_key(&jwk) {
                Ok(Some(key)) => {
                    if let Some(kid) = jwk.kid {
                        keys.insert(kid, Arc::new(key));
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(kid = ?jwk.kid, error = %e, "Skipping unusable RSA key"),
            }
        }
        Self::new(keys)
    }

    /// Look up a key by ID.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<Arc<RsaPublicKey>> {
        self.keys.get(kid).cloned()
    }

    /// Number of usable keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the generation holds no usable keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// When this generation was fetched.
    #[must_use]
    pub const fn cached_at(&self) -> Instant {
        self.cached_at
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() < ttl
    }
}

/// Per-cluster key store: discovery, fetch, and generation cache.
pub struct KeyStore {
    cluster: Arc<ClusterConfig>,
    client: reqwest::Client,
    ttl: Duration,
    jwks_uri: OnceCell<String>,
    generation: RwLock<Option<Arc<KeyGeneration>>>,
}

impl KeyStore {
    /// Create a key store for `cluster`.
    ///
    /// `client` should trust the cluster CA; `ttl` bounds generation age.
    #[must_use]
    pub fn new(cluster: Arc<ClusterConfig>, client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            cluster,
            client,
            ttl,
            jwks_uri: OnceCell::new(),
            generation: RwLock::new(None),
        }
    }

    /// The cluster these keys belong to.
    #[must_use]
    pub fn cluster(&self) -> &ClusterConfig {
        &self.cluster
    }

    /// Resolve the JWKS URI through OIDC discovery.
    ///
    /// A successful discovery is kept for the life of the store; failures
    /// are retried on the next call.
    ///
    /// # Errors
    ///
    /// Returns `JwksFetchFailed` if the discovery document cannot be fetched
    /// or has no `jwks_uri`.
    pub async fn discover(&self) -> Result<&str> {
        let uri = self
            .jwks_uri
            .get_or_try_init(|| async {
                let url = self.cluster.discovery_url();
                tracing::debug!(cluster = %self.cluster.name(), url = %url, "Fetching OIDC discovery");
                let document: DiscoveryDocument = self.get_json(&url).await?;
                if document.jwks_uri.is_empty() {
                    return Err(AuthError::JwksFetchFailed(
                        "discovery document has empty jwks_uri".to_string(),
                    ));
                }
                tracing::debug!(
                    cluster = %self.cluster.name(),
                    issuer = ?document.issuer,
                    jwks_uri = %document.jwks_uri,
                    "Discovered JWKS endpoint"
                );
                Ok(document.jwks_uri)
            })
            .await?;
        Ok(uri.as_str())
    }

    /// The current generation, fresh or not.
    #[must_use]
    pub fn current(&self) -> Option<Arc<KeyGeneration>> {
        self.generation.read().clone()
    }

    /// Return the cached generation while it is within the TTL, otherwise
    /// fetch and install a new one. `force` always fetches.
    ///
    /// A failed fetch leaves the previous generation installed.
    ///
    /// # Errors
    ///
    /// Returns `JwksFetchFailed` if discovery or the JWKS request fails.
    pub async fn fetch_keys(&self, force: bool) -> Result<Arc<KeyGeneration>> {
        if !force {
            if let Some(generation) = self.fresh_generation() {
                tracing::debug!(cluster = %self.cluster.name(), keys = generation.len(), "JWKS cache hit");
                return Ok(generation);
            }
        }

        let jwks_uri = self.discover().await?;
        tracing::debug!(cluster = %self.cluster.name(), url = %jwks_uri, force, "Fetching JWKS");
        let response: JwksResponse = self.get_json(jwks_uri).await?;

        let generation = Arc::new(KeyGeneration::from_response(response));
        if generation.is_empty() {
            tracing::warn!(cluster = %self.cluster.name(), "JWKS contains no usable RSA keys");
        } else {
            tracing::debug!(cluster = %self.cluster.name(), count = generation.len(), "Cached JWKS keys");
        }

        *self.generation.write() = Some(Arc::clone(&generation));
        Ok(generation)
    }

    /// Look up a key in the current generation while it is within the TTL.
    #[must_use]
    pub fn find_key(&self, kid: &str) -> Option<Arc<RsaPublicKey>> {
        self.fresh_generation()?.get(kid)
    }

    /// Find a key, refreshing once if it is not in the current key set.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent after a forced refresh, or
    /// `JwksFetchFailed` if keys cannot be fetched.
    pub async fn resolve_key(&self, kid: &str) -> Result<Arc<RsaPublicKey>> {
        if let Some(key) = self.fetch_keys(false).await?.get(kid) {
            return Ok(key);
        }

        tracing::debug!(cluster = %self.cluster.name(), kid = %kid, "Key not cached, forcing JWKS refresh");
        self.fetch_keys(true)
            .await?
            .get(kid)
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    fn fresh_generation(&self) -> Option<Arc<KeyGeneration>> {
        self.generation
            .read()
            .as_ref()
            .filter(|generation| generation.is_fresh(self.ttl))
            .cloned()
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .cluster
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchFailed(format!("{url}: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(AuthError::JwksFetchFailed(format!("{url} returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchFailed(format!("{url}: {e}")))
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("cluster", &self.cluster.name())
            .field("ttl", &self.ttl)
            .field("jwks_uri", &self.jwks_uri.get())
            .finish_non_exhaustive()
    }
}
