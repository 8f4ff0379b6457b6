//! Forwarding engine.
//!
//! # Data Flow
//! ```text
//! InterceptedRequest (parts + buffered or streaming body)
//!     → target.rs (join base path, rewrite Host)
//!     → headers.rs (strip hop-by-hop)
//!     → client.rs (pooled HTTP/HTTPS client, one attempt)
//!     → engine.rs (deadline, error classification)
//!     → upstream response, hop-by-hop stripped, body streamed back
//! ```
//!
//! # Per-request phases
//! ```text
//! Received → BodyParsed → Logged → Forwarding → { Responded | Failed }
//! ```
//! Each request walks this path once. `Responded` covers synthesized error
//! responses too; `Failed` means the caller's connection was aborted after
//! headers had been sent.

pub mod client;
pub mod engine;
pub mod headers;
pub mod target;

pub use engine::ForwardingEngine;
pub use target::UpstreamTarget;

/// Where a request is in its single pass through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    BodyParsed,
    Logged,
    Forwarding,
    Responded,
    Failed,
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestPhase::Received => "received",
            RequestPhase::BodyParsed => "body_parsed",
            RequestPhase::Logged => "logged",
            RequestPhase::Forwarding => "forwarding",
            RequestPhase::Responded => "responded",
            RequestPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}
