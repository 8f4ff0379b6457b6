//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → http::request (request id on every span)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing, pretty for development
//! - Request ID flows through every span of a request
//! - Metrics are cheap (atomic increments) and off unless a recorder is installed

pub mod logging;
pub mod metrics;
