//! Validation results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kube_sa_auth_core::ClaimedIdentity;

use crate::error::{AuthError, Result};

/// Which validator produced an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPath {
    /// Federated validation API.
    Federated,
    /// Kubernetes TokenReview API.
    TokenReview,
    /// Local signature check against the cluster JWKS.
    Jwks,
}

impl ValidationPath {
    /// Short name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Federated => "federated",
            Self::TokenReview => "token_review",
            Self::Jwks => "jwks",
        }
    }
}

/// A verified ServiceAccount identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedIdentity {
    /// Cluster the token was issued by.
    pub cluster: String,
    /// Kubernetes namespace.
    pub namespace: String,
    /// ServiceAccount name.
    pub service_account: String,
    /// Token issuer, when known.
    pub issuer: Option<String>,
    /// Token issue time, when known.
    pub issued_at: Option<DateTime<Utc>>,
    /// Token expiry, when known.
    pub expires_at: Option<DateTime<Utc>>,
    /// ServiceAccount UID, when known.
    pub uid: Option<String>,
    /// Validator that produced this identity.
    pub path: ValidationPath,
}

impl ValidatedIdentity {
    /// Create an identity with no token metadata.
    #[must_use]
    pub fn new(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        service_account: impl Into<String>,
        path: ValidationPath,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            service_account: service_account.into(),
            issuer: None,
            issued_at: None,
            expires_at: None,
            uid: None,
            path,
        }
    }

    /// Whether every field matches the claimed identity.
    #[must_use]
    pub fn matches(&self, claimed: &ClaimedIdentity) -> bool {
        self.cluster == claimed.cluster()
            && self.namespace == claimed.namespace()
            && self.service_account == claimed.service_account()
    }

    /// `cluster/namespace/serviceaccount`, the authenticated user name.
    #[must_use]
    pub fn username(&self) -> String {
        format!("{}/{}/{}", self.cluster, self.namespace, self.service_account)
    }
}

/// Result of one validator.
///
/// Only `Unavailable` lets the caller move on to another validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The token proves this identity.
    Success(ValidatedIdentity),
    /// The token was judged and refused.
    Rejected(AuthError),
    /// The validator could not reach a judgement.
    Unavailable(String),
}

impl ValidationOutcome {
    /// Whether the next validation path may be tried.
    #[must_use]
    pub const fn permits_fallback(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Convert to a `Result`, mapping `Unavailable` to `AuthError::Unavailable`.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason, or `Unavailable`.
    pub fn into_result(self) -> Result<ValidatedIdentity> {
        match self {
            Self::Success(identity) => Ok(identity),
            Self::Rejected(err) => Err(err),
            Self::Unavailable(reason) => Err(AuthError::Unavailable(reason)),
        }
    }
}

impl From<AuthError> for ValidationOutcome {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unavailable(reason) => Self::Unavailable(reason),
            other => Self::Rejected(other),
        }
    }
}

impl From<Result<ValidatedIdentity>> for ValidationOutcome {
    fn from(result: Result<ValidatedIdentity>) -> Self {
        result.map_or_else(Self::from, Self::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(cluster: &str) -> ValidatedIdentity {
        ValidatedIdentity::new(cluster, "ns1", "svc1", ValidationPath::Federated)
    }

    #[test]
    fn matches_every_field() {
        let claimed = ClaimedIdentity::parse("cluster-a/ns1/svc1").unwrap();
        assert!(identity("cluster-a").matches(&claimed));
        assert!(!identity("cluster-b").matches(&claimed));

        let mut other = identity("cluster-a");
        other.service_account = "other".to_string();
        assert!(!other.matches(&claimed));
    }

    #[test]
    fn local_claim_matches_local_cluster() {
        let claimed = ClaimedIdentity::parse("ns1/svc1").unwrap();
        assert!(identity("local").matches(&claimed));
    }

    #[test]
    fn username_is_three_part() {
        assert_eq!(identity("local").username(), "local/ns1/svc1");
    }

    #[test]
    fn only_unavailable_permits_fallback() {
        assert!(ValidationOutcome::Unavailable("timeout".into()).permits_fallback());
        assert!(!ValidationOutcome::Rejected(AuthError::SignatureInvalid).permits_fallback());
        assert!(!ValidationOutcome::Success(identity("local")).permits_fallback());
    }

    #[test]
    fn conversions() {
        let outcome: ValidationOutcome = AuthError::Unavailable("down".into()).into();
        assert_eq!(outcome, ValidationOutcome::Unavailable("down".into()));

        let outcome: ValidationOutcome = AuthError::KeyNotFound("k1".into()).into();
        assert_eq!(
            outcome.into_result(),
            Err(AuthError::KeyNotFound("k1".into()))
        );

        let outcome: ValidationOutcome = Ok(identity("local")).into();
        assert_eq!(outcome.into_result().unwrap().cluster, "local");
    }

    #[test]
    fn serializes_for_output() {
        let value = serde_json::to_value(identity("local")).unwrap();
        assert_eq!(value["path"], "federated");
        assert_eq!(value["service_account"], "svc1");
        assert!(value["expires_at"].is_null());
    }
}
