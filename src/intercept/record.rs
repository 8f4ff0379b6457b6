//! Per-request log record.

use axum::http::{header, request, HeaderMap, Version};
use bytes::Bytes;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::intercept::body::BodyPayload;

/// Snapshot of one inbound request, handed to the log sink before the
/// request is forwarded.
///
/// Fields the request did not produce are left out of the serialized form
/// rather than written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub url: String,
    pub method: String,
    pub headers: Map<String, Value>,
    pub http_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "lossy_utf8")]
    pub raw_body: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl LogRecord {
    pub fn new(parts: &request::Parts, payload: &BodyPayload) -> Self {
        let (raw_body, body) = match payload {
            BodyPayload::Empty => (None, None),
            BodyPayload::Parsed(value) => (None, Some(value.clone())),
            BodyPayload::Raw(raw) | BodyPayload::Malformed { raw, .. } => (Some(raw.clone()), None),
        };

        Self {
            url: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
            method: parts.method.to_string(),
            headers: headers_to_json(&parts.headers),
            http_version: version_label(parts.version),
            raw_body,
            body,
        }
    }

    /// Serialize to a JSON value.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Lowercase names in arrival order; repeats joined with `", "`, except
/// `set-cookie`, which keeps one array element per header line.
pub fn headers_to_json(headers: &HeaderMap) -> Map<String, Value> {
    let mut out = Map::new();
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        let value = if name == header::SET_COOKIE {
            Value::Array(values.into_iter().map(Value::String).collect())
        } else {
            Value::String(values.join(", "))
        };
        out.insert(name.as_str().to_string(), value);
    }
    out
}

/// `"1.1"`-style label.
pub fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "unknown",
    }
}

fn lossy_utf8<S: Serializer>(raw: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
    match raw {
        Some(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
        None => serializer.serialize_none(),
    }
}
