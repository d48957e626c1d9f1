//! Authentication error types.

use kube_sa_auth_core::IdentityError;
use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The claimed username is not `[cluster/]namespace/serviceaccount`.
    #[error("malformed identity: {0}")]
    MalformedIdentity(String),

    /// The token is not a well-formed compact JWT.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The token subject is not a ServiceAccount subject.
    #[error("malformed subject: {0}")]
    MalformedSubject(String),

    /// The token header names an algorithm other than RS256.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The token issuer does not match the configured issuer.
    #[error("invalid issuer: {0}")]
    InvalidIssuer(String),

    /// The token expired at the given unix timestamp.
    #[error("token expired at {exp}")]
    Expired {
        /// Expiry claim, seconds since the epoch.
        exp: i64,
    },

    /// The token lifetime exceeds the configured maximum.
    #[error("token lifetime {lifetime}s exceeds maximum {max}s")]
    TtlExceeded {
        /// Measured lifetime in seconds.
        lifetime: i64,
        /// Configured maximum in seconds.
        max: i64,
    },

    /// The verified identity differs from the claimed one.
    #[error("identity mismatch: claimed {expected}, token is {actual}")]
    IdentityMismatch {
        /// Identity the client claimed.
        expected: String,
        /// Identity the token proves.
        actual: String,
    },

    /// No signing key with the token's key ID is published.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The RS256 signature does not verify.
    #[error("invalid signature")]
    SignatureInvalid,

    /// A remote cluster identity could not be verified without the remote validator.
    #[error("cannot verify identity from cluster {0} locally")]
    CrossClusterUnverifiable(String),

    /// The remote validator rejected the token.
    #[error("remote validator rejected token: {0}")]
    RemoteRejected(String),

    /// Failed to fetch OIDC discovery or JWKS from the API server.
    #[error("JWKS fetch failed: {0}")]
    JwksFetchFailed(String),

    /// The remote validator could not be reached or returned an unusable response.
    #[error("validator unavailable: {0}")]
    Unavailable(String),

    /// The engine could not be configured.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns `true` if the next validation path may be tried after this error.
    #[must_use]
    pub const fn is_fallback_permitted(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Stable label for log fields and CLI output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedIdentity(_) => "malformed_identity",
            Self::MalformedToken(_) => "malformed_token",
            Self::MalformedSubject(_) => "malformed_subject",
            Self::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            Self::InvalidIssuer(_) => "invalid_issuer",
            Self::Expired { .. } => "expired",
            Self::TtlExceeded { .. } => "ttl_exceeded",
            Self::IdentityMismatch { .. } => "identity_mismatch",
            Self::KeyNotFound(_) => "key_not_found",
            Self::SignatureInvalid => "signature_invalid",
            Self::CrossClusterUnverifiable(_) => "cross_cluster_unverifiable",
            Self::RemoteRejected(_) => "remote_rejected",
            Self::JwksFetchFailed(_) => "jwks_fetch_failed",
            Self::Unavailable(_) => "unavailable",
            Self::Config(_) => "config",
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MalformedIdentity(msg) => Self::MalformedIdentity(msg),
            IdentityError::MalformedSubject(msg) => Self::MalformedSubject(msg),
        }
    }
}
