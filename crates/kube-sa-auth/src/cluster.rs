//! Cluster configuration.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};

use kube_sa_auth_core::LOCAL_CLUSTER;

use crate::config::AuthConfig;
use crate::http::load_service_account_token;

/// Connection details for one Kubernetes cluster.
///
/// Only the cluster this process runs in is configured. It is built once at
/// startup and shared read-only.
#[derive(Debug)]
pub struct ClusterConfig {
    name: String,
    api_server_url: String,
    expected_issuer: Option<String>,
    ca_cert_path: PathBuf,
    service_account_token: Option<SecretString>,
}

impl ClusterConfig {
    /// Create a cluster config without a bearer credential.
    #[must_use]
    pub fn new(name: impl Into<String>, api_server_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_server_url: api_server_url.into().trim_end_matches('/').to_string(),
            expected_issuer: None,
            ca_cert_path: PathBuf::new(),
            service_account_token: None,
        }
    }

    /// Build the local cluster from engine configuration, reading the
    /// ServiceAccount token from disk.
    #[must_use]
    pub fn local(config: &AuthConfig) -> Self {
        let token = load_service_account_token(&config.token_path);
        Self {
            expected_issuer: config.expected_issuer.clone(),
            ca_cert_path: config.ca_cert_path.clone(),
            service_account_token: token,
            ..Self::new(LOCAL_CLUSTER, config.api_server_url.as_str())
        }
    }

    /// Require tokens to carry this issuer.
    #[must_use]
    pub fn with_expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// Use this bearer credential for API server calls.
    #[must_use]
    pub fn with_service_account_token(mut self, token: SecretString) -> Self {
        self.service_account_token = Some(token);
        self
    }

    /// Cluster name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// API server base URL without a trailing slash.
    #[must_use]
    pub fn api_server_url(&self) -> &str {
        &self.api_server_url
    }

    /// Issuer tokens must carry, if enforced.
    #[must_use]
    pub fn expected_issuer(&self) -> Option<&str> {
        self.expected_issuer.as_deref()
    }

    /// CA bundle path for API server calls.
    #[must_use]
    pub fn ca_cert_path(&self) -> &Path {
        &self.ca_cert_path
    }

    /// Whether a bearer credential was loaded.
    #[must_use]
    pub const fn has_credential(&self) -> bool {
        self.service_account_token.is_some()
    }

    /// OIDC discovery document URL.
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.api_server_url)
    }

    /// TokenReview endpoint URL.
    #[must_use]
    pub fn token_review_url(&self) -> String {
        format!(
            "{}/apis/authentication.k8s.io/v1/tokenreviews",
            self.api_server_url
        )
    }

    /// Attach the bearer credential to a request, when one is loaded.
    pub(crate) fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.service_account_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}
