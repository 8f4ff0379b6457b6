//! Body classification and decoding.

use axum::http::{header, HeaderMap};
use bytes::Bytes;
use serde_json::Value;

use crate::intercept::form;

/// How a body is treated, decided from `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    UrlEncoded,
    Other,
}

impl BodyKind {
    /// Classify by media type, ignoring case and parameters such as `charset`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        else {
            return BodyKind::Other;
        };
        let essence = value.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case("application/json") {
            BodyKind::Json
        } else if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            BodyKind::UrlEncoded
        } else {
            BodyKind::Other
        }
    }

    /// Whether the body must be buffered to be decoded.
    pub fn is_decoded(self) -> bool {
        !matches!(self, BodyKind::Other)
    }
}

/// Outcome of decoding a buffered body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyPayload {
    /// Nothing was sent.
    Empty,
    /// Decoded JSON or form value.
    Parsed(Value),
    /// Buffered without decoding.
    Raw(Bytes),
    /// Decoding failed; the original bytes are kept.
    Malformed { raw: Bytes, reason: String },
}

/// Decode `bytes` according to `kind`.
pub fn decode_body(kind: BodyKind, bytes: &Bytes) -> BodyPayload {
    if bytes.is_empty() {
        return BodyPayload::Empty;
    }
    match kind {
        BodyKind::Json => match serde_json::from_slice(bytes) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => BodyPayload::Parsed(value),
            Ok(_) => BodyPayload::Malformed {
                raw: bytes.clone(),
                reason: "top-level JSON must be an object or array".to_string(),
            },
            Err(e) => BodyPayload::Malformed {
                raw: bytes.clone(),
                reason: e.to_string(),
            },
        },
        BodyKind::UrlEncoded => BodyPayload::Parsed(Value::Object(form::decode_extended(bytes))),
        BodyKind::Other => BodyPayload::Raw(bytes.clone()),
    }
}
