//! Kubernetes TokenReview client.
//!
//! Submits the token to the local API server, authenticating with this
//! process's own ServiceAccount credential. Only tokens issued by the local
//! cluster can be judged this way, so every identity it produces belongs to
//! the cluster named in its [`ClusterConfig`], and tokens claimed for any
//! other cluster are refused without a request.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::{TokenReview, TokenReviewSpec, TokenReviewStatus};

use kube_sa_auth_core::ServiceAccountSubject;

use crate::cluster::ClusterConfig;
use crate::error::AuthError;
use crate::jwt::token_preview;
use crate::outcome::{ValidatedIdentity, ValidationOutcome, ValidationPath};

use super::RemoteValidator;

/// TokenReview-based validator for the local cluster.
#[derive(Debug, Clone)]
pub struct TokenReviewValidator {
    cluster: Arc<ClusterConfig>,
    client: reqwest::Client,
}

impl TokenReviewValidator {
    /// Create a validator for `cluster`.
    ///
    /// `client` should trust the cluster CA.
    #[must_use]
    pub fn new(cluster: Arc<ClusterConfig>, client: reqwest::Client) -> Self {
        Self { cluster, client }
    }

    fn review_request(token: &str) -> TokenReview {
        TokenReview {
            spec: TokenReviewSpec {
                token: Some(token.to_string()),
                ..TokenReviewSpec::default()
            },
            ..TokenReview::default()
        }
    }

    fn identity_from_status(&self, status: TokenReviewStatus) -> Result<ValidatedIdentity, AuthError> {
        if status.authenticated != Some(true) {
            let reason = status
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "token not authenticated".to_string());
            return Err(AuthError::RemoteRejected(reason));
        }

        let user = status.user.unwrap_or_default();
        let username = user.username.ok_or_else(|| {
            AuthError::RemoteRejected("authenticated review has no username".to_string())
        })?;
        let (namespace, name) = ServiceAccountSubject::parse(&username)?.into_parts();

        let mut identity =
            ValidatedIdentity::new(self.cluster.name(), namespace, name, ValidationPath::TokenReview);
        identity.uid = user.uid.filter(|uid| !uid.is_empty());
        Ok(identity)
    }
}

#[async_trait]
impl RemoteValidator for TokenReviewValidator {
    fn name(&self) -> &'static str {
        "token_review"
    }

    async fn validate(&self, cluster: Option<&str>, token: &str) -> ValidationOutcome {
        if let Some(other) = cluster.filter(|name| *name != self.cluster.name()) {
            tracing::warn!(cluster = %other, "TokenReview cannot judge tokens from another cluster");
            return ValidationOutcome::Rejected(AuthError::CrossClusterUnverifiable(other.to_string()));
        }
        if !self.cluster.has_credential() {
            tracing::warn!(cluster = %self.cluster.name(), "No ServiceAccount credential for TokenReview");
            return ValidationOutcome::Unavailable("no service account credential".to_string());
        }

        let url = self.cluster.token_review_url();
        tracing::debug!(url = %url, token = %token_preview(token), "Submitting TokenReview");

        let request = self
            .cluster
            .authorize(self.client.post(&url))
            .json(&Self::review_request(token));
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "TokenReview request failed");
                return ValidationOutcome::Unavailable(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to read TokenReview response");
                return ValidationOutcome::Unavailable(format!("failed to read response: {e}"));
            }
        };

        if !status.is_success() {
            return parse_failure(status, &body);
        }

        let review: TokenReview = match serde_json::from_slice(&body) {
            Ok(review) => review,
            Err(e) => {
                tracing::warn!(error = %e, "Unparsable TokenReview response");
                return ValidationOutcome::Rejected(AuthError::RemoteRejected(format!(
                    "unparsable TokenReview response: {e}"
                )));
            }
        };
        let Some(review_status) = review.status else {
            return ValidationOutcome::Rejected(AuthError::RemoteRejected(
                "TokenReview returned no status".to_string(),
            ));
        };

        let outcome: ValidationOutcome = self.identity_from_status(review_status).into();
        if let ValidationOutcome::Rejected(err) = &outcome {
            tracing::warn!(error = %err, "TokenReview rejected token");
        }
        outcome
    }
}

/// Non-2xx: a Kubernetes `Status` object is a judgement, anything else is not.
fn parse_failure(status: reqwest::StatusCode, body: &[u8]) -> ValidationOutcome {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(object)) => {
            let message = object
                .get("message")
                .and_then(serde_json::Value::as_str)
                .filter(|m| !m.is_empty())
                .map_or_else(|| format!("HTTP {status}"), ToString::to_string);
            tracing::warn!(%status, message = %message, "TokenReview API refused request");
            ValidationOutcome::Rejected(AuthError::RemoteRejected(message))
        }
        _ => {
            tracing::warn!(%status, "TokenReview API returned unparsable error response");
            ValidationOutcome::Unavailable(format!("HTTP {status} with unparsable body"))
        }
    }
}
