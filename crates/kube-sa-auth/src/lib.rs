//! Kubernetes ServiceAccount token authentication.
//!
//! This crate maps a claimed identity (`[cluster/]namespace/serviceaccount`)
//! and a bearer token to a verified identity:
//!
//! - Remote validation through a federated API or the TokenReview API
//! - OIDC discovery and JWKS fetching with TTL-based caching
//! - RS256 signature verification over the original token bytes
//! - Expiry, lifetime and identity claim checks
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   username +     │────▶│  Authenticator   │
//! │   token          │     │                  │
//! └──────────────────┘     └───┬──────────┬───┘
//!                              │          │ Unavailable + local claim
//!                  ┌───────────▼──────┐ ┌─▼────────────────┐
//!                  │ RemoteValidator  │ │ LocalJwtValidator│
//!                  │ (trait)          │ │                  │
//!                  └───┬──────────┬───┘ └────────┬─────────┘
//!                      │          │              │
//!          ┌───────────▼──┐ ┌─────▼────────┐ ┌───▼──────────────┐
//!          │ Federated    │ │ TokenReview  │ │ KeyStore         │
//!          │ API          │ │ API          │ │ (key generation) │
//!          └──────────────┘ └──────────────┘ └────────┬─────────┘
//!                                                     │ HTTPS
//!                                            ┌────────▼─────────┐
//!                                            │   API server     │
//!                                            │   OIDC + JWKS    │
//!                                            └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use kube_sa_auth::{AuthConfig, Authenticator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::from_env();
//! let authenticator = Authenticator::from_config(&config)?;
//!
//! // In a connection handler:
//! let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6Ik...";
//! let identity = authenticator.authenticate("payments/api-server", token).await?;
//!
//! println!("Authenticated as {}", identity.username());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod authenticator;
pub mod claims;
pub mod cluster;
pub mod config;
pub mod error;
pub mod http;
pub mod jwks;
pub mod jwt;
pub mod local;
pub mod outcome;
pub mod remote;
pub mod signature;

pub use authenticator::Authenticator;
pub use claims::ClaimPolicy;
pub use cluster::ClusterConfig;
pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use jwks::{KeyGeneration, KeyStore};
pub use jwt::{token_preview, DecodedToken};
pub use local::LocalJwtValidator;
pub use outcome::{ValidatedIdentity, ValidationOutcome, ValidationPath};
pub use remote::{FederatedValidator, RemoteValidator, TokenReviewValidator};
pub use signature::RsaPublicKey;

pub use kube_sa_auth_core::{ClaimedIdentity, ServiceAccountSubject};

#[cfg(any(test, feature = "test-utils"))]
pub use remote::StaticRemoteValidator;
