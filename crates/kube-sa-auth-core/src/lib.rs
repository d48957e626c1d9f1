//! Identity types for Kubernetes ServiceAccount authentication.
//!
//! This crate provides the types shared by every validation path:
//!
//! - **Claimed identities**: the untrusted `[cluster/]namespace/serviceaccount`
//!   username a client presents, parsed and classified as local or remote
//! - **ServiceAccount subjects**: the `system:serviceaccount:<ns>:<name>` form
//!   Kubernetes puts in token subjects and TokenReview usernames
//! - **Error types**: parse failures for both of the above
//!
//! # Example
//!
//! ```
//! use kube_sa_auth_core::{ClaimedIdentity, ServiceAccountSubject};
//!
//! let claimed = ClaimedIdentity::parse("payments/api-server").unwrap();
//! assert_eq!(claimed.cluster(), "local");
//! assert!(claimed.is_local());
//!
//! let remote = ClaimedIdentity::parse("cluster-b/payments/api-server").unwrap();
//! assert!(!remote.is_local());
//!
//! let subject = ServiceAccountSubject::parse("system:serviceaccount:payments:api-server").unwrap();
//! assert_eq!(subject.namespace(), "payments");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod identity;
pub mod subject;

pub use error::{IdentityError, Result};
pub use identity::{ClaimedIdentity, LOCAL_CLUSTER, MAX_SEGMENT_LEN, SEPARATOR};
pub use subject::{ServiceAccountSubject, SUBJECT_PREFIX};
