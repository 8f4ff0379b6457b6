//! Single-target logging reverse proxy.
//!
//! Every inbound request is parsed, logged as a structured record, and
//! relayed unmodified (apart from hop-by-hop headers and `Host`) to one
//! fixed upstream origin.

pub mod config;
pub mod error;
pub mod forward;
pub mod http;
pub mod intercept;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, StartupError};
pub use http::HttpServer;
pub use intercept::{LogRecord, LogSink};
pub use lifecycle::Shutdown;
