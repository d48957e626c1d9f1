use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::outcome::{ValidatedIdentity, ValidationOutcome, ValidationPath};

use super::RemoteValidator;

/// A remote validator that returns a fixed outcome.
///
/// Records how often it was called and the cluster it was last asked about.
pub struct StaticRemoteValidator {
    outcome: ValidationOutcome,
    calls: AtomicUsize,
    last_cluster: Mutex<Option<String>>,
}

impl StaticRemoteValidator {
    /// Always return `outcome`.
    #[must_use]
    pub fn new(outcome: ValidationOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            last_cluster: Mutex::new(None),
        }
    }

    /// Always succeed with `cluster/namespace/service_account`.
    #[must_use]
    pub fn accepting(cluster: &str, namespace: &str, service_account: &str) -> Self {
        Self::new(ValidationOutcome::Success(ValidatedIdentity::new(
            cluster,
            namespace,
            service_account,
            ValidationPath::Federated,
        )))
    }

    /// Always report the validator as unreachable.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(ValidationOutcome::Unavailable("validator offline".to_string()))
    }

    /// Number of `validate` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Cluster passed to the most recent call.
    #[must_use]
    pub fn last_cluster(&self) -> Option<String> {
        self.last_cluster.lock().clone()
    }
}

#[async_trait]
impl RemoteValidator for StaticRemoteValidator {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn validate(&self, cluster: Option<&str>, _token: &str) -> ValidationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_cluster.lock() = cluster.map(str::to_string);
        self.outcome.clone()
    }
}
