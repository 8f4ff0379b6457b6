//! Request interceptor.
//!
//! # Data Flow
//! ```text
//! Request<Body>
//!     → body.rs (classify by Content-Type)
//!     → buffer up to max_body_bytes when the body is decoded (or buffer_all_bodies)
//!     → body.rs / form.rs (decode → BodyPayload)
//!     → record.rs (LogRecord)
//!     → sink.rs (emit, failures absorbed)
//!     → InterceptedRequest handed to the forwarding engine
//! ```
//!
//! # Design Decisions
//! - Logging happens before forwarding; a forwarded request always has a record
//! - Malformed bodies are forwarded untouched and logged raw
//! - Bodies that are not decoded stream straight through when their declared
//!   length fits the limit; bodies of unknown length are collected first

pub mod body;
pub mod form;
pub mod record;
pub mod sink;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, request, HeaderMap, Request},
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::error::{ProxyError, ProxyResult};
use crate::forward::client::chain_contains;
use crate::forward::RequestPhase;

pub use body::{decode_body, BodyKind, BodyPayload};
pub use record::LogRecord;
pub use sink::{LogSink, MemorySink, SinkError};

/// Request body as handed to the forwarding engine.
#[derive(Debug)]
pub enum ForwardBody {
    /// Consumed by the interceptor.
    Buffered(Bytes),
    /// Untouched inbound stream.
    Streaming(Body),
}

/// A request that has been parsed and logged.
#[derive(Debug)]
pub struct InterceptedRequest {
    pub parts: request::Parts,
    pub body: ForwardBody,
}

/// Parses and logs every inbound request before it is relayed.
#[derive(Clone)]
pub struct Interceptor {
    sink: Arc<dyn LogSink>,
    max_body_bytes: usize,
    buffer_all_bodies: bool,
}

impl Interceptor {
    pub fn new(sink: Arc<dyn LogSink>, max_body_bytes: usize, buffer_all_bodies: bool) -> Self {
        Self {
            sink,
            max_body_bytes,
            buffer_all_bodies,
        }
    }

    /// Buffer and decode the body if its type calls for it, then emit the
    /// log record.
    pub async fn intercept(&self, request: Request<Body>) -> ProxyResult<InterceptedRequest> {
        let (parts, body) = request.into_parts();
        tracing::trace!(phase = %RequestPhase::Received, uri = %parts.uri, "Intercepting request");

        let declared = declared_length(&parts.headers);
        if declared.is_some_and(|len| len > self.max_body_bytes as u64) {
            return Err(ProxyError::BodyTooLarge {
                limit: self.max_body_bytes,
            });
        }

        let kind = BodyKind::from_headers(&parts.headers);
        let decoded = kind.is_decoded() || self.buffer_all_bodies;
        let (payload, body) = if decoded {
            let bytes = self.buffer(body).await?;
            (decode_body(kind, &bytes), ForwardBody::Buffered(bytes))
        } else if declared.is_some() {
            let bounded = Body::new(Limited::new(body, self.max_body_bytes));
            (BodyPayload::Empty, ForwardBody::Streaming(bounded))
        } else {
            // Unknown length: the limit has to hold before the upstream is
            // contacted, so the body is collected but not logged.
            let bytes = self.buffer(body).await?;
            (BodyPayload::Empty, ForwardBody::Buffered(bytes))
        };

        if let BodyPayload::Malformed { reason, .. } = &payload {
            tracing::warn!(?kind, reason = %reason, "Body does not match its content type, forwarding raw");
        }
        tracing::trace!(phase = %RequestPhase::BodyParsed, ?kind, "Body classified");

        let record = LogRecord::new(&parts, &payload);
        sink::emit_isolated(self.sink.as_ref(), &record);
        tracing::trace!(phase = %RequestPhase::Logged, "Request logged");

        Ok(InterceptedRequest { parts, body })
    }

    async fn buffer(&self, body: Body) -> ProxyResult<Bytes> {
        match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) if chain_contains::<LengthLimitError>(&*e) => Err(ProxyError::BodyTooLarge {
                limit: self.max_body_bytes,
            }),
            Err(e) => Err(ProxyError::BodyRead(e.to_string())),
        }
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
