//! Configuration loading from disk and the environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const LISTEN_PORT: &str = "LISTEN_PORT";
pub const LISTEN_ADDRESS: &str = "LISTEN_ADDRESS";
pub const UPSTREAM_URL: &str = "UPSTREAM_URL";
pub const MAX_BODY_BYTES: &str = "MAX_BODY_BYTES";
pub const REQUEST_TIMEOUT_MS: &str = "REQUEST_TIMEOUT_MS";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the effective configuration: file (if any), then process
/// environment overrides, then validation.
pub fn load_from_env(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => ProxyConfig::default(),
    };
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Apply the `LISTEN_*`, `UPSTREAM_URL`, `MAX_BODY_BYTES` and
/// `REQUEST_TIMEOUT_MS` overrides found through `lookup`.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(value) = get(LISTEN_PORT) {
        config.listener.port = value.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Env {
                var: LISTEN_PORT,
                value: value.clone(),
                reason: e.to_string(),
            }
        })?;
    }
    if let Some(value) = get(LISTEN_ADDRESS) {
        config.listener.address = value.trim().to_string();
    }
    if let Some(value) = get(UPSTREAM_URL) {
        config.upstream.url = value.trim().to_string();
    }
    if let Some(value) = get(MAX_BODY_BYTES) {
        config.limits.max_body_bytes = parse_byte_size(&value).ok_or_else(|| ConfigError::Env {
            var: MAX_BODY_BYTES,
            value: value.clone(),
            reason: "expected a byte count such as 1048576, 512kb or 1mb".to_string(),
        })?;
    }
    if let Some(value) = get(REQUEST_TIMEOUT_MS) {
        config.timeouts.request_timeout_ms =
            value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
                var: REQUEST_TIMEOUT_MS,
                value: value.clone(),
                reason: e.to_string(),
            })?;
    }

    Ok(())
}

/// Parse `"1048576"`, `"100kb"`, `"1MB"`, `"2 gb"` (1024-based units).
pub fn parse_byte_size(input: &str) -> Option<usize> {
    let normalized = input.trim().to_ascii_lowercase();
    let split = normalized
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(normalized.len());
    let (digits, unit) = normalized.split_at(split);
    let count: usize = digits.parse().ok()?;
    let multiplier: usize = match unit.trim() {
        "" | "b" => 1,
        "kb" | "k" => 1 << 10,
        "mb" | "m" => 1 << 20,
        "gb" | "g" => 1 << 30,
        _ => return None,
    };
    count.checked_mul(multiplier)
}
