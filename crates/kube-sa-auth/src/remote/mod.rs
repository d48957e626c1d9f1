//! Remote validators.
//!
//! A remote validator hands the token to a service that can judge it, such as
//! a federated validation API that knows every cluster or the local API
//! server's TokenReview endpoint.

use async_trait::async_trait;

use crate::outcome::ValidationOutcome;

pub mod federated;
pub mod token_review;

#[cfg(any(test, feature = "test-utils"))]
mod mock;

pub use federated::FederatedValidator;
pub use token_review::TokenReviewValidator;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::StaticRemoteValidator;

/// Trait for validating tokens through a remote service.
///
/// Implementations return `Unavailable` only when no judgement was reached
/// (transport failure, timeout, unparsable error response).
#[async_trait]
pub trait RemoteValidator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Validate `token`, optionally scoped to a named cluster.
    async fn validate(&self, cluster: Option<&str>, token: &str) -> ValidationOutcome;
}
