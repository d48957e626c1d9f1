//! Identity parsing errors.

use thiserror::Error;

/// A result type using `IdentityError`.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors that can occur when parsing identities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The claimed username is not `[cluster/]namespace/serviceaccount`.
    #[error("malformed identity: {0}")]
    MalformedIdentity(String),

    /// The subject is not `system:serviceaccount:<namespace>:<name>`.
    #[error("malformed subject: {0}")]
    MalformedSubject(String),
}
