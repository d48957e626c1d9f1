//! Compact JWT decoding.
//!
//! Tokens are split and decoded here without trusting any claim. The signed
//! range is kept as a slice of the original input so the signature is checked
//! over the exact bytes the issuer signed.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};

use kube_sa_auth_core::ServiceAccountSubject;

use crate::error::{AuthError, Result};

/// Longest token accepted, in bytes.
pub const MAX_TOKEN_LEN: usize = 16 * 1024;

/// The only signing algorithm accepted.
pub const RS256: &str = "RS256";

const PREVIEW_CHARS: usize = 16;

/// Base64url decoding that accepts both padded and unpadded input.
const BASE64_URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64url string, padded or not.
///
/// # Errors
///
/// Returns the underlying decode error for characters outside the url-safe
/// alphabet or an impossible length.
pub fn decode_base64url(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL_LENIENT.decode(input)
}

/// Render a token for logs: a short prefix and the total length.
#[must_use]
pub fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(PREVIEW_CHARS).collect();
    format!("{prefix}... ({} bytes)", token.len())
}

/// Deserialize a NumericDate: any JSON number, fractions truncated toward zero.
///
/// # Errors
///
/// Fails for non-numbers and values outside the `i64` range.
pub(crate) fn numeric_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<i64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    whole_seconds(&number)
        .ok_or_else(|| D::Error::custom(format!("NumericDate out of range: {number}")))
}

/// [`numeric_date`] for optional claims; `null` reads as absent.
///
/// # Errors
///
/// Fails for non-numbers and values outside the `i64` range.
pub(crate) fn optional_numeric_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    Option::<serde_json::Number>::deserialize(deserializer)?
        .map(|number| {
            whole_seconds(&number)
                .ok_or_else(|| D::Error::custom(format!("NumericDate out of range: {number}")))
        })
        .transpose()
}

#[allow(clippy::cast_possible_truncation)]
fn whole_seconds(number: &serde_json::Number) -> Option<i64> {
    // 2^63, exactly representable.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    number.as_i64().or_else(|| {
        let secs = number.as_f64()?.trunc();
        (-LIMIT..LIMIT).contains(&secs).then_some(secs as i64)
    })
}

/// JOSE header fields the engine reads.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtHeader {
    /// Signing algorithm.
    pub alg: String,
    /// Key ID naming the JWKS entry that signed the token.
    pub kid: String,
    /// Token type, usually `JWT`.
    #[serde(default)]
    pub typ: Option<String>,
}

/// Payload claims of a ServiceAccount token.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    /// Issuer.
    pub iss: String,
    /// Subject, `system:serviceaccount:<namespace>:<name>`.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    #[serde(deserialize_with = "numeric_date")]
    pub exp: i64,
    /// Issue time, seconds since the epoch.
    #[serde(default, deserialize_with = "optional_numeric_date")]
    pub iat: Option<i64>,
    /// Kubernetes-specific claims of projected tokens.
    #[serde(default, rename = "kubernetes.io")]
    pub kubernetes: Option<KubernetesClaims>,
}

/// The `kubernetes.io` claim block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KubernetesClaims {
    /// Namespace of the ServiceAccount.
    #[serde(default)]
    pub namespace: Option<String>,
    /// ServiceAccount reference.
    #[serde(default)]
    pub serviceaccount: Option<ObjectReference>,
}

/// A `{name, uid}` reference inside `kubernetes.io`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectReference {
    /// Object name.
    #[serde(default)]
    pub name: Option<String>,
    /// Object UID.
    #[serde(default)]
    pub uid: Option<String>,
}

impl JwtClaims {
    /// ServiceAccount UID from the `kubernetes.io` block, if present.
    #[must_use]
    pub fn service_account_uid(&self) -> Option<&str> {
        self.kubernetes
            .as_ref()?
            .serviceaccount
            .as_ref()?
            .uid
            .as_deref()
    }
}

/// A decoded but unverified token.
#[derive(Debug)]
pub struct DecodedToken<'a> {
    raw: &'a str,
    signed_len: usize,
    header: JwtHeader,
    claims: JwtClaims,
    subject: ServiceAccountSubject,
    signature: Vec<u8>,
}

impl<'a> DecodedToken<'a> {
    /// Split and decode a compact JWT.
    ///
    /// # Errors
    ///
    /// - `MalformedToken` if the token is empty, oversized, does not have
    ///   exactly three non-empty segments, or a segment fails to decode
    /// - `MalformedSubject` if `sub` is not a ServiceAccount subject
    pub fn decode(token: &'a str) -> Result<Self> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(AuthError::MalformedToken(format!(
                "token exceeds {MAX_TOKEN_LEN} bytes"
            )));
        }

        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = segments.as_slice() else {
            return Err(AuthError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        };
        if header_b64.is_empty() || payload_b64.is_empty() || signature_b64.is_empty() {
            return Err(AuthError::MalformedToken("empty segment".to_string()));
        }

        let header: JwtHeader = decode_json_segment("header", header_b64)?;
        let claims: JwtClaims = decode_json_segment("payload", payload_b64)?;
        let signature = decode_base64url(signature_b64)
            .map_err(|e| AuthError::MalformedToken(format!("signature: {e}")))?;
        let subject = ServiceAccountSubject::parse(&claims.sub)?;

        Ok(Self {
            raw: token,
            signed_len: header_b64.len() + 1 + payload_b64.len(),
            header,
            claims,
            subject,
            signature,
        })
    }

    /// The `header.payload` bytes covered by the signature.
    #[must_use]
    pub fn signing_input(&self) -> &'a [u8] {
        self.raw
            .as_bytes()
            .get(..self.signed_len)
            .unwrap_or_default()
    }

    /// Decoded signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Parsed header.
    #[must_use]
    pub const fn header(&self) -> &JwtHeader {
        &self.header
    }

    /// Parsed claims.
    #[must_use]
    pub const fn claims(&self) -> &JwtClaims {
        &self.claims
    }

    /// Parsed subject.
    #[must_use]
    pub const fn subject(&self) -> &ServiceAccountSubject {
        &self.subject
    }
}

fn decode_json_segment<T: DeserializeOwned>(label: &str, segment: &str) -> Result<T> {
    let bytes = decode_base64url(segment)
        .map_err(|e| AuthError::MalformedToken(format!("{label}: {e}")))?;
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("{label} is not a JSON object: {e}")))?;
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| AuthError::MalformedToken(format!("{label}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::prelude::*;
    use serde_json::json;

    fn segment(value: &serde_json::Value) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    fn header() -> serde_json::Value {
        json!({"alg": "RS256", "kid": "key-1", "typ": "JWT"})
    }

    fn claims() -> serde_json::Value {
        json!({
            "iss": "https://kubernetes.default.svc.cluster.local",
            "sub": "system:serviceaccount:ns1:svc1",
            "exp": 1_900_000_000,
            "iat": 1_899_999_000,
            "kubernetes.io": {
                "namespace": "ns1",
                "serviceaccount": {"name": "svc1", "uid": "5b1c-uid"}
            }
        })
    }

    fn token(header: &serde_json::Value, claims: &serde_json::Value) -> String {
        format!("{}.{}.c2lnbmF0dXJl", segment(header), segment(claims))
    }

    #[test]
    fn decodes_service_account_token() {
        let raw = token(&header(), &claims());
        let decoded = DecodedToken::decode(&raw).unwrap();

        assert_eq!(decoded.header().kid, "key-1");
        assert_eq!(decoded.header().alg, "RS256");
        assert_eq!(decoded.claims().exp, 1_900_000_000);
        assert_eq!(decoded.claims().iat, Some(1_899_999_000));
        assert_eq!(decoded.claims().service_account_uid(), Some("5b1c-uid"));
        assert_eq!(decoded.subject().namespace(), "ns1");
        assert_eq!(decoded.signature(), b"signature");
    }

    #[test]
    fn signing_input_is_exact_prefix() {
        let raw = token(&header(), &claims());
        let decoded = DecodedToken::decode(&raw).unwrap();
        let dot = raw.rfind('.').unwrap();
        assert_eq!(decoded.signing_input(), &raw.as_bytes()[..dot]);
    }

    #[test]
    fn padded_segments_accepted() {
        let padded = |v: &serde_json::Value| BASE64_URL_SAFE.encode(serde_json::to_vec(v).unwrap());
        let raw = format!("{}.{}.c2lnbmF0dXJl", padded(&header()), padded(&claims()));
        assert!(DecodedToken::decode(&raw).is_ok());
    }

    #[test]
    fn wrong_segment_count() {
        for raw in ["", "a", "a.b", "a.b.c.d"] {
            assert!(matches!(
                DecodedToken::decode(raw),
                Err(AuthError::MalformedToken(_))
            ));
        }
    }

    #[test]
    fn empty_segment() {
        let raw = format!("{}..c2ln", segment(&header()));
        assert!(matches!(
            DecodedToken::decode(&raw),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn invalid_base64() {
        let raw = format!("{}.{}.***", segment(&header()), segment(&claims()));
        assert!(matches!(
            DecodedToken::decode(&raw),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn non_object_segments_rejected() {
        let raw = token(&json!(["RS256", "key-1"]), &claims());
        assert!(matches!(
            DecodedToken::decode(&raw),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn missing_kid_rejected() {
        let raw = token(&json!({"alg": "RS256"}), &claims());
        assert!(matches!(
            DecodedToken::decode(&raw),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn missing_required_claims_rejected() {
        for field in ["iss", "sub", "exp"] {
            let mut payload = claims();
            payload.as_object_mut().unwrap().remove(field);
            let raw = token(&header(), &payload);
            assert!(
                matches!(DecodedToken::decode(&raw), Err(AuthError::MalformedToken(_))),
                "missing {field}"
            );
        }
    }

    #[test]
    fn string_exp_rejected() {
        let mut payload = claims();
        payload["exp"] = json!("1900000000");
        let raw = token(&header(), &payload);
        assert!(DecodedToken::decode(&raw).is_err());
    }

    #[test]
    fn fractional_timestamps_truncated() {
        let mut payload = claims();
        payload["exp"] = json!(1_900_000_000.0);
        payload["iat"] = json!(1_899_999_000.75);
        let raw = token(&header(), &payload);

        let decoded = DecodedToken::decode(&raw).unwrap();
        assert_eq!(decoded.claims().exp, 1_900_000_000);
        assert_eq!(decoded.claims().iat, Some(1_899_999_000));
    }

    #[test]
    fn null_iat_is_absent() {
        let mut payload = claims();
        payload["iat"] = serde_json::Value::Null;
        let raw = token(&header(), &payload);
        assert_eq!(DecodedToken::decode(&raw).unwrap().claims().iat, None);
    }

    #[test]
    fn out_of_range_exp_rejected() {
        for exp in [json!(1e19), json!(-1e19), json!(u64::MAX)] {
            let mut payload = claims();
            payload["exp"] = exp.clone();
            let raw = token(&header(), &payload);
            assert!(
                matches!(DecodedToken::decode(&raw), Err(AuthError::MalformedToken(_))),
                "{exp}"
            );
        }
    }

    #[test]
    fn non_service_account_subject() {
        let mut payload = claims();
        payload["sub"] = json!("system:node:worker-1");
        let raw = token(&header(), &payload);
        assert!(matches!(
            DecodedToken::decode(&raw),
            Err(AuthError::MalformedSubject(_))
        ));
    }

    #[test]
    fn oversized_token_rejected() {
        let raw = "a".repeat(MAX_TOKEN_LEN + 1);
        let err = DecodedToken::decode(&raw).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn preview_is_bounded() {
        let raw = token(&header(), &claims());
        let preview = token_preview(&raw);
        assert!(preview.starts_with(&raw[..16]));
        assert!(preview.ends_with(&format!("... ({} bytes)", raw.len())));
        assert!(!preview.contains(&raw[..32]));
    }
}
