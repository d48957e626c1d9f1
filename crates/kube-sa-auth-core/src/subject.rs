//! ServiceAccount subjects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::identity::MAX_SEGMENT_LEN;

/// Prefix Kubernetes uses for ServiceAccount usernames and token subjects.
pub const SUBJECT_PREFIX: &str = "system:serviceaccount:";

/// A `system:serviceaccount:<namespace>:<name>` subject.
///
/// Appears as the `sub` claim of projected ServiceAccount tokens and as
/// `status.user.username` in TokenReview responses.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceAccountSubject {
    namespace: String,
    name: String,
}

impl ServiceAccountSubject {
    /// Parse a subject string.
    ///
    /// # Errors
    ///
    /// Returns `MalformedSubject` if the prefix is missing, either part is
    /// empty or longer than [`MAX_SEGMENT_LEN`] bytes, or the name contains `:`.
    pub fn parse(subject: &str) -> Result<Self, IdentityError> {
        let rest = subject.strip_prefix(SUBJECT_PREFIX).ok_or_else(|| {
            IdentityError::MalformedSubject(format!("missing '{SUBJECT_PREFIX}' prefix"))
        })?;
        let (namespace, name) = rest.split_once(':').ok_or_else(|| {
            IdentityError::MalformedSubject("missing namespace separator".to_string())
        })?;

        if namespace.is_empty() || name.is_empty() {
            return Err(IdentityError::MalformedSubject(
                "empty namespace or name".to_string(),
            ));
        }
        if name.contains(':') {
            return Err(IdentityError::MalformedSubject(
                "name contains ':'".to_string(),
            ));
        }
        if namespace.len() > MAX_SEGMENT_LEN || name.len() > MAX_SEGMENT_LEN {
            return Err(IdentityError::MalformedSubject(format!(
                "segment exceeds {MAX_SEGMENT_LEN} bytes"
            )));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Kubernetes namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// ServiceAccount name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split into `(namespace, name)`.
    #[must_use]
    pub fn into_parts(self) -> (String, String) {
        (self.namespace, self.name)
    }
}

impl FromStr for ServiceAccountSubject {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ServiceAccountSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SUBJECT_PREFIX}{}:{}", self.namespace, self.name)
    }
}

impl fmt::Debug for ServiceAccountSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceAccountSubject({self})")
    }
}

impl TryFrom<String> for ServiceAccountSubject {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ServiceAccountSubject> for String {
    fn from(subject: ServiceAccountSubject) -> Self {
        subject.to_string()
    }
}
