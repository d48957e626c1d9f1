//! RS256 signature verification.

use std::fmt;

use ring::signature::{RsaPublicKeyComponents, RSA_PKCS1_2048_8192_SHA256};
use thiserror::Error;

use crate::jwt::DecodedToken;

/// Smallest accepted RSA modulus, in bits.
pub const MIN_MODULUS_BITS: usize = 2048;

/// Largest accepted RSA modulus, in bits.
pub const MAX_MODULUS_BITS: usize = 8192;

/// Errors converting key material into an [`RsaPublicKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// A required JWK member is absent.
    #[error("missing JWK member: {0}")]
    MissingMember(&'static str),

    /// A JWK member is not valid base64url.
    #[error("invalid base64url in {member}: {reason}")]
    Encoding {
        /// JWK member name.
        member: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Modulus or exponent is zero.
    #[error("empty key component")]
    EmptyComponent,

    /// Modulus size is outside the supported range.
    #[error("unsupported modulus size: {0} bits")]
    ModulusSize(usize),
}

/// An RSA public key as big-endian modulus and exponent.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    n: Vec<u8>,
    e: Vec<u8>,
}

impl RsaPublicKey {
    /// Build a key from big-endian `n` and `e`.
    ///
    /// Leading zero bytes are stripped.
    ///
    /// # Errors
    ///
    /// Returns `EmptyComponent` for a zero component and `ModulusSize` when
    /// the modulus is outside 2048..=8192 bits.
    pub fn from_components(n: &[u8], e: &[u8]) -> Result<Self, KeyError> {
        let n = strip_leading_zeros(n);
        let e = strip_leading_zeros(e);
        if n.is_empty() || e.is_empty() {
            return Err(KeyError::EmptyComponent);
        }

        let key = Self {
            n: n.to_vec(),
            e: e.to_vec(),
        };
        let bits = key.modulus_bits();
        if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&bits) {
            return Err(KeyError::ModulusSize(bits));
        }
        Ok(key)
    }

    /// Modulus length in bits.
    #[must_use]
    pub fn modulus_bits(&self) -> usize {
        match self.n.first() {
            Some(&top) => (self.n.len() - 1) * 8 + (8 - top.leading_zeros() as usize),
            None => 0,
        }
    }

    /// Verify an RSASSA-PKCS1-v1_5 SHA-256 signature.
    ///
    /// Malformed or wrong-length signatures verify as `false`.
    #[must_use]
    pub fn verify_rs256(&self, message: &[u8], signature: &[u8]) -> bool {
        let components = RsaPublicKeyComponents {
            n: self.n.as_slice(),
            e: self.e.as_slice(),
        };
        components
            .verify(&RSA_PKCS1_2048_8192_SHA256, message, signature)
            .is_ok()
    }
}

impl fmt::Debug for RsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPublicKey")
            .field("bits", &self.modulus_bits())
            .finish_non_exhaustive()
    }
}

/// Verify a decoded token's signature over its original `header.payload` bytes.
#[must_use]
pub fn verify_signature(token: &DecodedToken<'_>, key: &RsaPublicKey) -> bool {
    key.verify_rs256(token.signing_input(), token.signature())
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes.get(start..).unwrap_or_default()
}
