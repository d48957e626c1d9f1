//! Local JWT validation against the cluster's published keys.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::claims::ClaimPolicy;
use crate::error::{AuthError, Result};
use crate::jwks::KeyStore;
use crate::jwt::{token_preview, DecodedToken, RS256};
use crate::outcome::{ValidatedIdentity, ValidationPath};
use crate::signature::verify_signature;

/// Validates ServiceAccount tokens issued by the local cluster.
///
/// Checks run in this order:
///
/// 1. decode (`MalformedToken`, `MalformedSubject`)
/// 2. algorithm is RS256 (`UnsupportedAlgorithm`)
/// 3. `exp` is in the future (`Expired`)
/// 4. issuer, when one is configured (`InvalidIssuer`)
/// 5. signing key lookup with one forced refresh (`KeyNotFound`, `JwksFetchFailed`)
/// 6. signature (`SignatureInvalid`)
/// 7. namespace and ServiceAccount (`IdentityMismatch`)
/// 8. remaining lifetime `exp - now` (`TtlExceeded`)
#[derive(Debug)]
pub struct LocalJwtValidator {
    keys: Arc<KeyStore>,
    policy: ClaimPolicy,
}

impl LocalJwtValidator {
    /// Create a validator backed by `keys`.
    #[must_use]
    pub fn new(keys: Arc<KeyStore>, policy: ClaimPolicy) -> Self {
        Self { keys, policy }
    }

    /// The key store for this cluster.
    #[must_use]
    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Validate `token` as `namespace/service_account`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check; see the type docs for the order.
    pub async fn validate(
        &self,
        token: &str,
        namespace: &str,
        service_account: &str,
    ) -> Result<ValidatedIdentity> {
        let cluster = self.keys.cluster();
        let decoded = DecodedToken::decode(token)?;
        let header = decoded.header();
        let claims = decoded.claims();

        if header.alg != RS256 {
            return Err(AuthError::UnsupportedAlgorithm(header.alg.clone()));
        }

        let now = Utc::now().timestamp();
        ClaimPolicy::check_expiry(claims.exp, now)?;

        if let Some(expected) = cluster.expected_issuer() {
            if claims.iss != expected {
                return Err(AuthError::InvalidIssuer(claims.iss.clone()));
            }
        }

        let key = self.keys.resolve_key(&header.kid).await?;
        if !verify_signature(&decoded, &key) {
            tracing::warn!(
                cluster = %cluster.name(),
                kid = %header.kid,
                token = %token_preview(token),
                "Signature verification failed"
            );
            return Err(AuthError::SignatureInvalid);
        }

        let subject = decoded.subject();
        ClaimPolicy::check_identity(namespace, service_account, subject.namespace(), subject.name())?;
        self.policy.check_remaining_lifetime(claims.exp, now)?;

        let mut identity = ValidatedIdentity::new(
            cluster.name(),
            subject.namespace(),
            subject.name(),
            ValidationPath::Jwks,
        );
        identity.issuer = Some(claims.iss.clone());
        identity.expires_at = DateTime::from_timestamp(claims.exp, 0);
        identity.issued_at = claims.iat.and_then(|iat| DateTime::from_timestamp(iat, 0));
        identity.uid = claims.service_account_uid().map(str::to_string);

        tracing::debug!(
            cluster = %cluster.name(),
            namespace = %identity.namespace,
            service_account = %identity.service_account,
            kid = %header.kid,
            "Token verified against JWKS"
        );
        Ok(identity)
    }
}
