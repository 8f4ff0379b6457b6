//! Relaying one request to the upstream and streaming the answer back.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, request, Request, Response},
};
use futures_util::stream;
use http_body_util::{BodyExt, LengthLimitError, StreamBody};
use tokio::time::{timeout_at, Instant};

use crate::error::{ProxyError, ProxyResult};
use crate::forward::client::{chain_contains, UpstreamClient};
use crate::forward::headers::strip_hop_by_hop;
use crate::forward::target::UpstreamTarget;
use crate::forward::RequestPhase;
use crate::intercept::{ForwardBody, InterceptedRequest};
use crate::observability::metrics;

/// Forwards requests to the single configured upstream.
///
/// Holds no per-request state; clones share the connection pool.
#[derive(Clone)]
pub struct ForwardingEngine {
    client: UpstreamClient,
    target: Arc<UpstreamTarget>,
    deadline: Duration,
    max_body_bytes: usize,
}

impl ForwardingEngine {
    pub fn new(
        client: UpstreamClient,
        target: Arc<UpstreamTarget>,
        deadline: Duration,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            client,
            target,
            deadline,
            max_body_bytes,
        }
    }

    /// Relay `request` with a single attempt.
    ///
    /// Errors before the upstream's response headers arrive come back as
    /// `Err` so the caller can synthesize a response. Once headers are
    /// relayed, failures end the body stream with an error, which aborts
    /// the caller's connection.
    pub async fn forward(&self, request: InterceptedRequest) -> ProxyResult<Response<Body>> {
        let deadline = Instant::now() + self.deadline;
        let InterceptedRequest { parts, body } = request;

        tracing::debug!(
            phase = %RequestPhase::Forwarding,
            method = %parts.method,
            upstream = %self.target,
            "Forwarding request"
        );

        let outbound = self.build_outbound(&parts, body)?;

        let response = match timeout_at(deadline, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.classify(e)),
            // Dropping the pending request future cancels the upstream exchange.
            Err(_) => {
                let err = ProxyError::UpstreamTimeout(self.deadline);
                metrics::record_upstream_error(err.kind());
                return Err(err);
            }
        };

        let (mut parts, upstream_body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        tracing::debug!(
            phase = %RequestPhase::Responded,
            status = parts.status.as_u16(),
            "Upstream responded"
        );

        Ok(Response::from_parts(
            parts,
            guarded_body(upstream_body, deadline, self.deadline),
        ))
    }

    fn build_outbound(&self, parts: &request::Parts, body: ForwardBody) -> ProxyResult<Request<Body>> {
        let uri = self
            .target
            .join(parts.uri.path_and_query())
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;

        let mut headers = parts.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.insert(header::HOST, self.target.host_header());

        let body = match body {
            ForwardBody::Buffered(bytes) => Body::from(bytes),
            ForwardBody::Streaming(body) => body,
        };

        let mut outbound = Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .body(body)
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
        *outbound.headers_mut() = headers;
        Ok(outbound)
    }

    fn classify(&self, err: hyper_util::client::legacy::Error) -> ProxyError {
        let kind = if chain_contains::<LengthLimitError>(&err) {
            ProxyError::BodyTooLarge {
                limit: self.max_body_bytes,
            }
        } else if err.is_connect() {
            ProxyError::UpstreamUnreachable(describe(&err))
        } else {
            ProxyError::Upstream(describe(&err))
        };
        if kind.is_upstream_fault() {
            metrics::record_upstream_error(kind.kind());
        }
        kind
    }
}

/// Full cause chain, outermost first.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Stream the upstream body frame by frame, failing the stream if the
/// upstream errors or the request deadline passes.
fn guarded_body(body: hyper::body::Incoming, deadline: Instant, budget: Duration) -> Body {
    let frames = stream::unfold(Some(body), move |state| async move {
        let Some(mut body) = state else {
            return None;
        };
        match timeout_at(deadline, body.frame()).await {
            Ok(Some(Ok(frame))) => Some((Ok(frame), Some(body))),
            Ok(None) => None,
            Ok(Some(Err(e))) => {
                let err = ProxyError::MidStream(describe(&e));
                mid_stream_failure(&err);
                Some((Err(err), None))
            }
            Err(_) => {
                let err = ProxyError::MidStream(format!("deadline of {budget:?} elapsed"));
                mid_stream_failure(&err);
                Some((Err(err), None))
            }
        }
    });
    Body::new(StreamBody::new(frames))
}

fn mid_stream_failure(err: &ProxyError) {
    tracing::warn!(phase = %RequestPhase::Failed, error = %err, "Aborting response");
    metrics::record_upstream_error(err.kind());
}
