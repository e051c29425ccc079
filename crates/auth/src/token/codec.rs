//! Compact token decoding (structure only, no trust decisions).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Token claims: the fields this crate inspects are typed, anything else is
/// kept verbatim in `extensions`.
///
/// `iss`, `aud` and `sub` are held as raw JSON values. Whether they are
/// present strings is a claim check, not a decoding concern, so a token with
/// `"aud": ["a", "b"]` still reaches the expiry check first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedPayload {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub iss: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub aud: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub sub: Value,
    /// Issued-at, seconds since the Unix epoch. Fractional values are kept.
    pub iat: f64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: f64,
    #[serde(default, deserialize_with = "string_or_none", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl DecodedPayload {
    pub fn issuer(&self) -> Option<&str> {
        self.iss.as_str()
    }

    pub fn audience(&self) -> Option<&str> {
        self.aud.as_str()
    }

    pub fn subject(&self) -> Option<&str> {
        self.sub.as_str()
    }

    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }
}

/// A claim rendered for error messages: strings bare, anything else as JSON.
pub fn claim_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// The three dot-separated segments exactly as they appeared on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSegments<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

impl<'a> RawSegments<'a> {
    pub fn split(token: &'a str) -> AuthResult<Self> {
        let mut parts = token.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(payload), Some(signature), None) => Ok(Self {
                header,
                payload,
                signature,
            }),
            _ => Err(AuthError::malformed(format!(
                "expected 3 segments, found {}",
                token.split('.').count()
            ))),
        }
    }

    /// Bytes covered by the signature: `"{header}.{payload}"` as received.
    pub fn signing_input(&self) -> Vec<u8> {
        let mut input = Vec::with_capacity(self.header.len() + 1 + self.payload.len());
        input.extend_from_slice(self.header.as_bytes());
        input.push(b'.');
        input.extend_from_slice(self.payload.as_bytes());
        input
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken<'a> {
    pub segments: RawSegments<'a>,
    pub header: DecodedHeader,
    pub payload: DecodedPayload,
}

pub fn decode(token: &str) -> AuthResult<DecodedToken<'_>> {
    let segments = RawSegments::split(token)?;
    let header = decode_json(segments.header, "header")?;
    let payload = decode_json(segments.payload, "payload")?;
    Ok(DecodedToken {
        segments,
        header,
        payload,
    })
}

/// Base64url-decode an unpadded segment.
///
/// Padding is re-added before decoding with the padded URL-safe alphabet.
pub fn decode_segment(segment: &str) -> AuthResult<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    let padding = match trimmed.len() % 4 {
        0 => "",
        2 => "==",
        3 => "=",
        _ => return Err(AuthError::malformed("invalid base64url length")),
    };
    let padded = format!("{trimmed}{padding}");
    URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| AuthError::malformed(format!("invalid base64url: {e}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> AuthResult<T> {
    let bytes = decode_segment(segment).map_err(|e| match e {
        AuthError::MalformedToken(msg) => AuthError::malformed(format!("{what}: {msg}")),
        other => other,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::malformed(format!("{what}: invalid JSON: {e}")))
}
