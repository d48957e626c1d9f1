//! Engine configuration.
//!
//! Every setting is read from the process environment; unset, empty, or
//! unparsable values fall back to the defaults below.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Federated validation endpoint. Unset disables the federated validator.
pub const ENV_FEDERATED_AUTH_URL: &str = "KUBE_FEDERATED_AUTH_URL";
/// Enables the TokenReview validator when no federated endpoint is set.
pub const ENV_TOKEN_REVIEW_ENABLED: &str = "K8S_TOKENREVIEW_ENABLED";
/// Maximum accepted token lifetime in seconds.
pub const ENV_MAX_TOKEN_TTL: &str = "MAX_TOKEN_TTL";
/// JWKS cache lifetime in seconds.
pub const ENV_JWKS_CACHE_TTL: &str = "JWKS_CACHE_TTL";
/// Local API server base URL.
pub const ENV_API_SERVER: &str = "K8S_API_SERVER";
/// Issuer that local tokens must carry.
pub const ENV_EXPECTED_ISSUER: &str = "K8S_EXPECTED_ISSUER";
/// CA bundle trusted for API server calls.
pub const ENV_CA_CERT_PATH: &str = "K8S_CA_CERT_PATH";
/// This process's own ServiceAccount token.
pub const ENV_TOKEN_PATH: &str = "K8S_TOKEN_PATH";
/// Outbound connect timeout in seconds.
pub const ENV_CONNECT_TIMEOUT: &str = "HTTP_CONNECT_TIMEOUT_SECS";
/// Outbound total request timeout in seconds.
pub const ENV_REQUEST_TIMEOUT: &str = "HTTP_TIMEOUT_SECS";

/// Configuration for the authentication engine.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Federated validation API endpoint.
    #[serde(default)]
    pub federated_auth_url: Option<String>,

    /// Use the local API server's TokenReview endpoint as the remote validator.
    #[serde(default)]
    pub token_review_enabled: bool,

    /// Maximum token lifetime in seconds.
    #[serde(default = "AuthConfig::default_max_token_ttl")]
    pub max_token_ttl_seconds: u64,

    /// How long a fetched key generation stays fresh, in seconds.
    #[serde(default = "AuthConfig::default_jwks_cache_ttl")]
    pub jwks_cache_ttl_seconds: u64,

    /// Local API server base URL.
    #[serde(default = "AuthConfig::default_api_server_url")]
    pub api_server_url: String,

    /// Issuer local tokens must carry. `None` accepts any issuer.
    #[serde(default)]
    pub expected_issuer: Option<String>,

    /// CA certificate bundle for API server calls.
    #[serde(default = "AuthConfig::default_ca_cert_path")]
    pub ca_cert_path: PathBuf,

    /// This process's ServiceAccount token, sent as the bearer credential.
    #[serde(default = "AuthConfig::default_token_path")]
    pub token_path: PathBuf,

    /// Connect timeout for outbound calls, in seconds.
    #[serde(default = "AuthConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Total timeout for outbound calls, in seconds.
    #[serde(default = "AuthConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl AuthConfig {
    const fn default_max_token_ttl() -> u64 {
        3600
    }

    const fn default_jwks_cache_ttl() -> u64 {
        3600
    }

    fn default_api_server_url() -> String {
        "https://kubernetes.default.svc".to_string()
    }

    fn default_ca_cert_path() -> PathBuf {
        PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt")
    }

    fn default_token_path() -> PathBuf {
        PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token")
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    const fn default_request_timeout() -> u64 {
        10
    }

    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let seconds = |name: &str, default: u64| match get(name) {
            None => default,
            Some(raw) => match raw.parse::<u64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    tracing::warn!(variable = name, value = %raw, default, "Ignoring invalid duration");
                    default
                }
            },
        };

        let defaults = Self::default();
        Self {
            federated_auth_url: get(ENV_FEDERATED_AUTH_URL),
            token_review_enabled: get(ENV_TOKEN_REVIEW_ENABLED).is_some_and(|v| parse_flag(&v)),
            max_token_ttl_seconds: seconds(ENV_MAX_TOKEN_TTL, defaults.max_token_ttl_seconds),
            jwks_cache_ttl_seconds: seconds(ENV_JWKS_CACHE_TTL, defaults.jwks_cache_ttl_seconds),
            api_server_url: get(ENV_API_SERVER).unwrap_or(defaults.api_server_url),
            expected_issuer: get(ENV_EXPECTED_ISSUER),
            ca_cert_path: get(ENV_CA_CERT_PATH).map_or(defaults.ca_cert_path, PathBuf::from),
            token_path: get(ENV_TOKEN_PATH).map_or(defaults.token_path, PathBuf::from),
            connect_timeout_seconds: seconds(ENV_CONNECT_TIMEOUT, defaults.connect_timeout_seconds),
            request_timeout_seconds: seconds(ENV_REQUEST_TIMEOUT, defaults.request_timeout_seconds),
        }
    }

    /// Get the maximum token lifetime as a `Duration`.
    #[must_use]
    pub const fn max_token_ttl(&self) -> Duration {
        Duration::from_secs(self.max_token_ttl_seconds)
    }

    /// Get the JWKS cache lifetime as a `Duration`.
    #[must_use]
    pub const fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get the total request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            federated_auth_url: None,
            token_review_enabled: false,
            max_token_ttl_seconds: Self::default_max_token_ttl(),
            jwks_cache_ttl_seconds: Self::default_jwks_cache_ttl(),
            api_server_url: Self::default_api_server_url(),
            expected_issuer: None,
            ca_cert_path: Self::default_ca_cert_path(),
            token_path: Self::default_token_path(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
