//! Outbound HTTP plumbing shared by the key store and remote validators.

use std::io::ErrorKind;
use std::path::Path;

use secrecy::SecretString;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};

/// Largest ServiceAccount token file accepted, in bytes.
pub const MAX_CREDENTIAL_LEN: usize = 10_000;

const USER_AGENT: &str = concat!("kube-sa-auth/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client with the configured timeouts.
///
/// When `ca_cert_path` names an existing PEM file its certificate is added to
/// the trust roots. A missing file is skipped.
///
/// # Errors
///
/// Returns `Config` if the CA file cannot be read or parsed, or the client
/// cannot be built.
pub fn build_client(config: &AuthConfig, ca_cert_path: Option<&Path>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .user_agent(USER_AGENT);

    if let Some(path) = ca_cert_path {
        match std::fs::read(path) {
            Ok(pem) => {
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    AuthError::Config(format!("invalid CA certificate {}: {e}", path.display()))
                })?;
                builder = builder.add_root_certificate(cert);
                tracing::debug!(path = %path.display(), "Loaded CA certificate");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "CA certificate not found, using system roots");
            }
            Err(e) => {
                return Err(AuthError::Config(format!(
                    "failed to read CA certificate {}: {e}",
                    path.display()
                )));
            }
        }
    }

    builder
        .build()
        .map_err(|e| AuthError::Config(format!("failed to create HTTP client: {e}")))
}

/// Read this process's ServiceAccount token.
///
/// Returns `None` (with a warning) when the file is missing, unreadable, empty
/// after trimming, or larger than [`MAX_CREDENTIAL_LEN`].
#[must_use]
pub fn load_service_account_token(path: &Path) -> Option<SecretString> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ServiceAccount token not loaded");
            return None;
        }
    };

    if raw.len() > MAX_CREDENTIAL_LEN {
        tracing::warn!(
            path = %path.display(),
            size = raw.len(),
            max = MAX_CREDENTIAL_LEN,
            "ServiceAccount token file too large"
        );
        return None;
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(path = %path.display(), "ServiceAccount token file is empty");
        return None;
    }

    Some(SecretString::from(trimmed.to_string()))
}
