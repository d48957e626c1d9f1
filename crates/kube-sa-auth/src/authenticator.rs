//! The authentication decision.
//!
//! One attempt runs at most two validators and never retries:
//!
//! 1. the remote validator, when one is configured; its identity must match
//!    the claim and pass the lifetime checks
//! 2. local JWKS validation, only if the remote validator was unavailable
//!    (or absent) and the claim names the local cluster
//!
//! A remote rejection is final.

use std::sync::Arc;

use chrono::Utc;

use kube_sa_auth_core::ClaimedIdentity;

use crate::claims::ClaimPolicy;
use crate::cluster::ClusterConfig;
use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::http::build_client;
use crate::jwks::KeyStore;
use crate::jwt::{token_preview, MAX_TOKEN_LEN};
use crate::local::LocalJwtValidator;
use crate::outcome::{ValidatedIdentity, ValidationOutcome};
use crate::remote::{FederatedValidator, RemoteValidator, TokenReviewValidator};

/// Authenticates claimed ServiceAccount identities.
///
/// Shared across concurrent attempts; all state lives in the key store.
pub struct Authenticator {
    remote: Option<Arc<dyn RemoteValidator>>,
    local: LocalJwtValidator,
    policy: ClaimPolicy,
}

impl Authenticator {
    /// Create an authenticator with only local validation.
    #[must_use]
    pub fn new(local: LocalJwtValidator, policy: ClaimPolicy) -> Self {
        Self {
            remote: None,
            local,
            policy,
        }
    }

    /// Try `remote` before local validation.
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteValidator>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Build the authenticator described by `config`.
    ///
    /// The federated validator is used when its URL is set; otherwise
    /// TokenReview when enabled; otherwise local validation only.
    ///
    /// # Errors
    ///
    /// Returns `Config` if an HTTP client cannot be built.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let cluster = Arc::new(ClusterConfig::local(config));
        let api_client = build_client(config, Some(cluster.ca_cert_path()))?;
        let keys = Arc::new(KeyStore::new(
            Arc::clone(&cluster),
            api_client.clone(),
            config.jwks_cache_ttl(),
        ));
        let policy = ClaimPolicy::from_config(config);
        let authenticator = Self::new(LocalJwtValidator::new(keys, policy), policy);

        let remote: Option<Arc<dyn RemoteValidator>> = if let Some(url) = &config.federated_auth_url {
            let client = build_client(config, None)?;
            Some(Arc::new(FederatedValidator::new(client, url.as_str())))
        } else if config.token_review_enabled {
            Some(Arc::new(TokenReviewValidator::new(cluster, api_client)))
        } else {
            None
        };

        tracing::info!(
            remote = remote.as_ref().map_or("none", |r| r.name()),
            api_server = %config.api_server_url,
            max_token_ttl = policy.max_token_ttl(),
            jwks_cache_ttl = config.jwks_cache_ttl_seconds,
            "Authenticator configured"
        );

        Ok(match remote {
            Some(remote) => authenticator.with_remote(remote),
            None => authenticator,
        })
    }

    /// The configured remote validator, if any.
    #[must_use]
    pub fn remote(&self) -> Option<&dyn RemoteValidator> {
        self.remote.as_deref()
    }

    /// The local validator.
    #[must_use]
    pub const fn local(&self) -> &LocalJwtValidator {
        &self.local
    }

    /// Authenticate `token` as the identity named by `username`.
    ///
    /// # Errors
    ///
    /// Returns the reason the attempt was rejected. `Unavailable` is never
    /// returned: an unreachable remote validator leads to local validation
    /// or `CrossClusterUnverifiable`.
    pub async fn authenticate(&self, username: &str, token: &str) -> Result<ValidatedIdentity> {
        let claimed = ClaimedIdentity::parse(username).map_err(|e| {
            tracing::warn!(error = %e, "Rejected malformed username");
            AuthError::from(e)
        })?;
        self.authenticate_claim(&claimed, token).await
    }

    /// Authenticate `token` as an already parsed identity.
    ///
    /// # Errors
    ///
    /// See [`Authenticator::authenticate`].
    pub async fn authenticate_claim(
        &self,
        claimed: &ClaimedIdentity,
        token: &str,
    ) -> Result<ValidatedIdentity> {
        let result = self.run(claimed, token).await;
        match &result {
            Ok(identity) => tracing::info!(
                user = %claimed,
                path = identity.path.as_str(),
                "Authentication succeeded"
            ),
            Err(e) => tracing::warn!(
                user = %claimed,
                error_kind = e.kind(),
                error = %e,
                token = %token_preview(token),
                "Authentication rejected"
            ),
        }
        result
    }

    async fn run(&self, claimed: &ClaimedIdentity, token: &str) -> Result<ValidatedIdentity> {
        if token.is_empty() {
            return Err(AuthError::MalformedToken("empty token".to_string()));
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(AuthError::MalformedToken(format!(
                "token exceeds {MAX_TOKEN_LEN} bytes"
            )));
        }

        if let Some(remote) = &self.remote {
            match remote.validate(Some(claimed.cluster()), token).await {
                ValidationOutcome::Success(identity) => {
                    return self.accept_remote(claimed, identity);
                }
                ValidationOutcome::Rejected(err) => return Err(err),
                ValidationOutcome::Unavailable(reason) => {
                    tracing::warn!(
                        validator = remote.name(),
                        reason = %reason,
                        user = %claimed,
                        "Remote validator unavailable, falling back"
                    );
                }
            }
        }

        if !claimed.is_local() {
            return Err(AuthError::CrossClusterUnverifiable(
                claimed.cluster().to_string(),
            ));
        }

        self.local
            .validate(token, claimed.namespace(), claimed.service_account())
            .await
    }

    fn accept_remote(
        &self,
        claimed: &ClaimedIdentity,
        identity: ValidatedIdentity,
    ) -> Result<ValidatedIdentity> {
        if !identity.matches(claimed) {
            return Err(AuthError::IdentityMismatch {
                expected: claimed.to_string(),
                actual: identity.username(),
            });
        }

        let now = Utc::now().timestamp();
        if let Some(exp) = identity.expires_at.map(|t| t.timestamp()) {
            ClaimPolicy::check_expiry(exp, now)?;
            match identity.issued_at.map(|t| t.timestamp()) {
                Some(iat) => self.policy.check_issued_lifetime(iat, exp)?,
                None => self.policy.check_remaining_lifetime(exp, now)?,
            }
        }
        Ok(identity)
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("remote", &self.remote.as_ref().map(|r| r.name()))
            .field("local", &self.local)
            .field("policy", &self.policy)
            .finish()
    }
}
