//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (LISTEN_*, UPSTREAM_URL, MAX_BODY_BYTES, REQUEST_TIMEOUT_MS overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no runtime reconfiguration
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    ListenerConfig, LimitsConfig, LogFormat, ObservabilityConfig, ProxyConfig, RequestLogSink,
    TimeoutConfig, UpstreamConfig,
};
