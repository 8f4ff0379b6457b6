//! Error types surfaced on the request path and at startup.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// A failure while handling one request.
///
/// Every variant is converted into a synthesized response at the boundary
/// where it occurs; none of them escapes the request's task.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Buffered body grew past the configured maximum.
    #[error("request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },

    /// The inbound body stream broke while being buffered.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The upstream connection could not be established.
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// No upstream response within the request deadline.
    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// Any other failure talking to the upstream before headers were relayed.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The upstream response body failed after headers were relayed.
    #[error("upstream response aborted mid-stream: {0}")]
    MidStream(String),

    /// The outbound request could not be assembled.
    #[error("failed to build upstream request: {0}")]
    InvalidRequest(String),
}

impl ProxyError {
    /// Status code of the synthesized response.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::BodyRead(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream(_)
            | ProxyError::MidStream(_)
            | ProxyError::InvalidRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the upstream, rather than the caller, caused the failure.
    /// Only these count towards `proxy_upstream_errors_total`.
    pub fn is_upstream_fault(&self) -> bool {
        matches!(
            self,
            ProxyError::UpstreamUnreachable(_)
                | ProxyError::UpstreamTimeout(_)
                | ProxyError::Upstream(_)
                | ProxyError::MidStream(_)
        )
    }

    /// Short label for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::BodyTooLarge { .. } => "body_too_large",
            ProxyError::BodyRead(_) => "body_read",
            ProxyError::UpstreamUnreachable(_) => "upstream_unreachable",
            ProxyError::UpstreamTimeout(_) => "upstream_timeout",
            ProxyError::Upstream(_) => "upstream",
            ProxyError::MidStream(_) => "mid_stream",
            ProxyError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = format!("Something went wrong. \n\n\n{self}");
        let mut response = (self.status(), body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;

/// Failure to assemble the server before it starts accepting traffic.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid upstream target: {0}")]
    Target(#[from] crate::forward::target::TargetError),
    #[error("failed to configure upstream TLS: {0}")]
    Tls(#[from] rustls::Error),
}
