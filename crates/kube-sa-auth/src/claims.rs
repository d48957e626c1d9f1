//! Claim checks applied after a token or remote response is trusted.

use std::time::Duration;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};

/// Lifetime and identity rules for verified claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPolicy {
    max_token_ttl: i64,
}

impl ClaimPolicy {
    /// Create a policy with the given maximum token lifetime.
    #[must_use]
    pub fn new(max_token_ttl: Duration) -> Self {
        Self {
            max_token_ttl: i64::try_from(max_token_ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Create a policy from engine configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.max_token_ttl())
    }

    /// Maximum token lifetime in seconds.
    #[must_use]
    pub const fn max_token_ttl(&self) -> i64 {
        self.max_token_ttl
    }

    /// `exp` must be strictly after `now`.
    ///
    /// # Errors
    ///
    /// Returns `Expired` otherwise.
    pub fn check_expiry(exp: i64, now: i64) -> Result<()> {
        if exp > now {
            Ok(())
        } else {
            Err(AuthError::Expired { exp })
        }
    }

    /// The issued lifetime `exp - iat` must not exceed the maximum.
    ///
    /// # Errors
    ///
    /// Returns `TtlExceeded` otherwise.
    pub fn check_issued_lifetime(&self, iat: i64, exp: i64) -> Result<()> {
        self.check_lifetime(exp.saturating_sub(iat))
    }

    /// The remaining lifetime `exp - now` must not exceed the maximum.
    ///
    /// # Errors
    ///
    /// Returns `TtlExceeded` otherwise.
    pub fn check_remaining_lifetime(&self, exp: i64, now: i64) -> Result<()> {
        self.check_lifetime(exp.saturating_sub(now))
    }

    fn check_lifetime(&self, lifetime: i64) -> Result<()> {
        if lifetime > self.max_token_ttl {
            return Err(AuthError::TtlExceeded {
                lifetime,
                max: self.max_token_ttl,
            });
        }
        Ok(())
    }

    /// The token's namespace and ServiceAccount must equal the expected ones.
    ///
    /// # Errors
    ///
    /// Returns `IdentityMismatch` otherwise.
    pub fn check_identity(
        expected_namespace: &str,
        expected_service_account: &str,
        namespace: &str,
        service_account: &str,
    ) -> Result<()> {
        if namespace == expected_namespace && service_account == expected_service_account {
            return Ok(());
        }
        Err(AuthError::IdentityMismatch {
            expected: format!("{expected_namespace}/{expected_service_account}"),
            actual: format!("{namespace}/{service_account}"),
        })
    }
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}
