//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, body limit, tracing span)
//!     → request.rs (request ID)
//!     → intercept (parse body, emit log record)
//!     → forward (relay to the upstream)
//!     → response.rs (synthesized response on failure)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
