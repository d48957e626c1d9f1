//! Claimed identities.
//!
//! A client presents a username of the form `[cluster/]namespace/serviceaccount`.
//! The username is untrusted: it only tells the engine which identity the
//! bearer token is expected to prove.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Cluster name used when the username omits the cluster segment.
pub const LOCAL_CLUSTER: &str = "local";

/// Segment separator in a claimed username.
pub const SEPARATOR: char = '/';

/// Maximum length of a single segment, in bytes.
pub const MAX_SEGMENT_LEN: usize = 128;

/// The identity a client claims to hold, derived from its username.
///
/// Serializes as the canonical `cluster/namespace/serviceaccount` string.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClaimedIdentity {
    cluster: String,
    namespace: String,
    service_account: String,
    is_local: bool,
}

impl ClaimedIdentity {
    /// Parse a username.
    ///
    /// - `namespace/serviceaccount` claims the local cluster.
    /// - `cluster/namespace/serviceaccount` is local only when `cluster` is `local`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedIdentity` for any other separator count, an empty
    /// segment, or a segment longer than [`MAX_SEGMENT_LEN`] bytes.
    pub fn parse(username: &str) -> Result<Self, IdentityError> {
        let segments: Vec<&str> = username.split(SEPARATOR).collect();
        let (cluster, namespace, service_account) = match segments.as_slice() {
            [namespace, service_account] => (LOCAL_CLUSTER, *namespace, *service_account),
            [cluster, namespace, service_account] => (*cluster, *namespace, *service_account),
            _ => {
                return Err(IdentityError::MalformedIdentity(format!(
                    "expected 1 or 2 '{SEPARATOR}' separators, found {}",
                    segments.len().saturating_sub(1)
                )))
            }
        };

        for (label, segment) in [
            ("cluster", cluster),
            ("namespace", namespace),
            ("service account", service_account),
        ] {
            validate_segment(label, segment)?;
        }

        Ok(Self {
            is_local: cluster == LOCAL_CLUSTER,
            cluster: cluster.to_string(),
            namespace: namespace.to_string(),
            service_account: service_account.to_string(),
        })
    }

    /// Cluster name; `local` when the username had no cluster segment.
    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Kubernetes namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// ServiceAccount name.
    #[must_use]
    pub fn service_account(&self) -> &str {
        &self.service_account
    }

    /// Whether the identity belongs to the cluster this process runs in.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.is_local
    }
}

fn validate_segment(label: &str, segment: &str) -> Result<(), IdentityError> {
    if segment.is_empty() {
        return Err(IdentityError::MalformedIdentity(format!("empty {label}")));
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(IdentityError::MalformedIdentity(format!(
            "{label} exceeds {MAX_SEGMENT_LEN} bytes"
        )));
    }
    Ok(())
}

impl FromStr for ClaimedIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ClaimedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.cluster, self.namespace, self.service_account
        )
    }
}

impl fmt::Debug for ClaimedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimedIdentity({self})")
    }
}

impl TryFrom<String> for ClaimedIdentity {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ClaimedIdentity> for String {
    fn from(identity: ClaimedIdentity) -> Self {
        identity.to_string()
    }
}
