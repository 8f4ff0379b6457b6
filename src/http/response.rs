//! Response synthesis for failed requests.
//!
//! Upstream responses are relayed by the forwarding engine as they arrive.
//! Anything that fails before upstream headers exist ends up here and
//! becomes a plain-text response, so the caller is never left hanging.

use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::forward::RequestPhase;

/// Log `err` and turn it into the caller-facing response.
pub fn error_response(err: ProxyError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(
            phase = %RequestPhase::Responded,
            kind = err.kind(),
            status = status.as_u16(),
            error = %err,
            "Upstream failure, synthesizing response"
        );
    } else {
        tracing::warn!(
            phase = %RequestPhase::Responded,
            kind = err.kind(),
            status = status.as_u16(),
            error = %err,
            "Request rejected"
        );
    }
    err.into_response()
}
