//! Centralized error handling for navdoon.
//!
//! One enum per concern, aggregated into a top-level [`Error`] so call
//! sites can use `?` without caring which subsystem raised it, while
//! still matching on the specific variant when they need to.

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type returned across crate boundaries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    CollectorIo(#[from] CollectorIoError),

    #[error(transparent)]
    ShutdownTimeout(#[from] ShutdownTimeoutError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Startup-time configuration problems. Surfaced before any task starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid address '{0}': {1}")]
    InvalidAddress(String, String),

    #[error("port out of range in '{spec}': {port} (must be 1-65535)")]
    PortOutOfRange { spec: String, port: i64 },

    #[error("duplicate port {port} in address list '{spec}'")]
    DuplicatePort { spec: String, port: u16 },

    #[error("flush interval must be > 0, got {0}")]
    InvalidFlushInterval(f64),

    #[error("collector-threads-limit ({limit}) must be 0 (unbounded) or >= collector-threads ({threads})")]
    InvalidWorkerLimit { threads: usize, limit: usize },

    #[error("collector-threads must be >= 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("failed to read config file '{path}': {source}")]
    ReadFailed { path: String, source: io::Error },

    #[error("failed to parse config file '{path}': {source}")]
    ParseFailed { path: String, source: serde_yaml::Error },
}

/// A single line failed to parse. Never fatal; the rest of the batch continues.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty metric name in line '{0}'")]
    EmptyName(String),

    #[error("missing '|type' in line '{0}'")]
    MissingType(String),

    #[error("unknown metric type '{type_tag}' in line '{line}'")]
    UnknownType { line: String, type_tag: String },

    #[error("invalid value '{value}' for metric '{name}' in line '{line}'")]
    InvalidValue {
        line: String,
        name: String,
        value: String,
    },

    #[error("sample rate must be in (0, 1], got {rate} in line '{line}'")]
    InvalidSampleRate { line: String, rate: String },

    #[error("malformed line '{0}'")]
    Malformed(String),
}

/// A sink failed to flush a batch. Logged and dropped; the fan-out worker
/// keeps running.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink '{sink}' io error: {source}")]
    Io { sink: String, source: io::Error },

    #[error("sink '{sink}' exceeded {retries} connection retries")]
    RetriesExhausted { sink: String, retries: u32 },

    #[error("sink '{sink}' error: {message}")]
    Other { sink: String, message: String },
}

/// Transient or fatal collector socket errors.
#[derive(Debug, thiserror::Error)]
pub enum CollectorIoError {
    #[error("failed to bind {kind} collector on {addr}: {source}")]
    BindFailed {
        kind: &'static str,
        addr: String,
        source: io::Error,
    },

    #[error("{kind} collector io error on {addr}: {source}")]
    Transient {
        kind: &'static str,
        addr: String,
        source: io::Error,
    },
}

/// Supervisor-level shutdown budget exceeded.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownTimeoutError {
    #[error("{component} did not shut down within {budget_ms}ms")]
    Exceeded { component: String, budget_ms: u64 },
}
