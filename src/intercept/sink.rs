//! Log sinks for request records.
//!
//! The proxy only guarantees the shape and timing of each [`LogRecord`];
//! where it ends up is decided by the sink. Sinks are shared across all
//! connection tasks and serialize their own writes.

use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::config::{ObservabilityConfig, RequestLogSink};
use crate::intercept::record::LogRecord;
use crate::observability::metrics;

/// Errors a sink may report. They never reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write log record: {0}")]
    Io(#[from] std::io::Error),
    #[error("log sink lock poisoned")]
    Poisoned,
}

/// Destination for request log records.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError>;
}

/// Hand `record` to `sink`, absorbing errors and panics.
///
/// Returns whether the sink accepted the record.
pub fn emit_isolated(sink: &dyn LogSink, record: &LogRecord) -> bool {
    let outcome = catch_unwind(AssertUnwindSafe(|| sink.emit(record)));
    let error = match outcome {
        Ok(Ok(())) => return true,
        Ok(Err(e)) => e.to_string(),
        Err(_) => "log sink panicked".to_string(),
    };
    tracing::warn!(error = %error, url = %record.url, "Request log record dropped");
    metrics::record_sink_failure();
    false
}

/// Build the sink selected in configuration.
pub fn from_config(config: &ObservabilityConfig) -> Arc<dyn LogSink> {
    match config.request_log {
        RequestLogSink::Stdout => Arc::new(WriterSink::stdout(config.pretty_request_log)),
        RequestLogSink::Tracing => Arc::new(TracingSink),
    }
}

/// Writes one JSON document per record to any writer.
pub struct WriterSink<W> {
    writer: Mutex<W>,
    pretty: bool,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W, pretty: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            pretty,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WriterSink<std::io::Stdout> {
    pub fn stdout(pretty: bool) -> Self {
        Self::new(std::io::stdout(), pretty)
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = if self.pretty {
            serde_json::to_vec_pretty(record)?
        } else {
            serde_json::to_vec(record)?
        };
        line.push(b'\n');

        let mut writer = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Emits each record as an `info` event on the `request_log` target.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        let json = serde_json::to_string(record)?;
        tracing::info!(target: "request_log", record = %json, "Request received");
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .push(record.clone());
        Ok(())
    }
}
