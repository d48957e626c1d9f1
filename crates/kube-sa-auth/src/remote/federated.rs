//! Federated validation API client.
//!
//! The federated service knows the signing keys of every member cluster. It
//! takes `{"cluster", "token"}` and answers with the verified identity:
//!
//! ```json
//! {
//!   "cluster": "cluster-a",
//!   "kubernetes.io": {"namespace": "ns1", "serviceaccount": {"name": "svc1"}},
//!   "exp": 1700003600,
//!   "iat": 1700000000
//! }
//! ```
//!
//! Failures carry `{"error", "message"}` with a non-2xx status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::jwt::{optional_numeric_date, token_preview};
use crate::outcome::{ValidatedIdentity, ValidationOutcome, ValidationPath};

use super::RemoteValidator;

/// Request body for the federated validation API.
#[derive(Debug, Serialize)]
struct FederatedRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster: Option<&'a str>,
    token: &'a str,
}

/// Successful response from the federated validation API.
#[derive(Debug, Default, Deserialize)]
struct FederatedResponse {
    #[serde(default)]
    cluster: Option<String>,
    #[serde(default, rename = "kubernetes.io")]
    kubernetes: Option<KubernetesInfo>,
    #[serde(default, deserialize_with = "optional_numeric_date")]
    exp: Option<i64>,
    #[serde(default, deserialize_with = "optional_numeric_date")]
    iat: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct KubernetesInfo {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    serviceaccount: Option<ServiceAccountInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceAccountInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    uid: Option<String>,
}

/// Client for the federated validation API.
#[derive(Debug, Clone)]
pub struct FederatedValidator {
    client: reqwest::Client,
    url: String,
}

impl FederatedValidator {
    /// Create a validator posting to `url`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RemoteValidator for FederatedValidator {
    fn name(&self) -> &'static str {
        "federated"
    }

    async fn validate(&self, cluster: Option<&str>, token: &str) -> ValidationOutcome {
        tracing::debug!(
            url = %self.url,
            cluster = ?cluster,
            token = %token_preview(token),
            "Calling federated validator"
        );

        let request = FederatedRequest { cluster, token };
        let response = match self.client.post(&self.url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Federated validator unreachable");
                return ValidationOutcome::Unavailable(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Failed to read federated response");
                return ValidationOutcome::Unavailable(format!("failed to read response: {e}"));
            }
        };

        if status.is_success() {
            parse_success(&body)
        } else {
            parse_failure(status, &body)
        }
    }
}

fn parse_success(body: &[u8]) -> ValidationOutcome {
    let outcome: ValidationOutcome = parse_identity(body).into();
    if let ValidationOutcome::Rejected(err) = &outcome {
        tracing::warn!(error = %err, "Unusable federated success response");
    }
    outcome
}

fn parse_identity(body: &[u8]) -> Result<ValidatedIdentity, AuthError> {
    let response: FederatedResponse = serde_json::from_slice(body)
        .map_err(|e| AuthError::RemoteRejected(format!("unparsable response: {e}")))?;

    let kubernetes = response.kubernetes.unwrap_or_default();
    let service_account = kubernetes.serviceaccount.unwrap_or_default();
    let (Some(cluster), Some(namespace), Some(name)) = (
        non_empty(response.cluster),
        non_empty(kubernetes.namespace),
        non_empty(service_account.name),
    ) else {
        return Err(AuthError::RemoteRejected(
            "response missing cluster, namespace or serviceaccount".to_string(),
        ));
    };

    let mut identity = ValidatedIdentity::new(cluster, namespace, name, ValidationPath::Federated);
    identity.expires_at = timestamp("exp", response.exp)?;
    identity.issued_at = timestamp("iat", response.iat)?;
    identity.uid = non_empty(service_account.uid);
    Ok(identity)
}

fn parse_failure(status: reqwest::StatusCode, body: &[u8]) -> ValidationOutcome {
    let Ok(object) = serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(body) else {
        tracing::warn!(%status, "Federated validator returned unparsable error response");
        return ValidationOutcome::Unavailable(format!("HTTP {status} with unparsable body"));
    };

    let error = str_field(&object, "error");
    let message = str_field(&object, "message");
    tracing::warn!(%status, error, message, "Federated validator rejected token");

    let detail = match (error.is_empty(), message.is_empty()) {
        (false, false) => format!("{error}: {message}"),
        (false, true) => error.to_string(),
        (true, false) => message.to_string(),
        (true, true) => format!("HTTP {status}"),
    };
    rejected(detail)
}

fn str_field<'a>(object: &'a serde_json::Map<String, serde_json::Value>, name: &str) -> &'a str {
    object
        .get(name)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
}

fn rejected(detail: String) -> ValidationOutcome {
    ValidationOutcome::Rejected(AuthError::RemoteRejected(detail))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Non-positive timestamps are treated as absent.
fn timestamp(label: &str, value: Option<i64>) -> Result<Option<DateTime<Utc>>, AuthError> {
    match value.filter(|&v| v > 0) {
        None => Ok(None),
        Some(secs) => DateTime::from_timestamp(secs, 0)
            .map(Some)
            .ok_or_else(|| AuthError::RemoteRejected(format!("{label} out of range: {secs}"))),
    }
}
