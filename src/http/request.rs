//! Request identification.
//!
//! Every request gets an id as early as possible so all of its spans and
//! events can be correlated. A caller-supplied `x-request-id` is reused,
//! otherwise a UUID v4 is generated. The id lives in request extensions
//! only; forwarded headers are left as the caller sent them.

use axum::{
    body::Body,
    http::{HeaderName, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reuse the caller's `x-request-id` if it is printable and short.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        request
            .headers()
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= 128)
            .map(|id| Self(id.to_string()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extension access to the request id.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Middleware that attaches a [`RequestId`] to every request.
pub async fn assign_request_id(mut request: Request<Body>, next: Next) -> Response {
    let id = RequestId::from_request(&request);
    request.extensions_mut().insert(id);
    next.run(request).await
}
