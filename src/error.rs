//! Error handling for the sqlsweep scanner
//!
//! Two layers live here. [`ScanError`] covers the failures that abort a run
//! before any probe is sent (bad range, bad configuration, output I/O).
//! [`ProbeFault`] covers everything that can go wrong against a single host;
//! those never escape the worker that hit them.

use std::io;
use thiserror::Error;

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Concurrency limiter closed")]
    LimiterClosed,

    #[error("Result aggregation failed: {0}")]
    AggregationError(String),
}

/// Per-host conditions raised while probing a single address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFault {
    #[error("connection refused")]
    ConnectRefused,

    #[error("connect timed out")]
    ConnectTimeout,

    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("read timed out")]
    ReadTimeout,

    #[error("connection closed during read")]
    UnexpectedCloseDuringRead,
}

impl ProbeFault {
    /// Map an I/O error from the connect step onto a fault.
    pub fn from_connect_error(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => ProbeFault::ConnectRefused,
            io::ErrorKind::TimedOut => ProbeFault::ConnectTimeout,
            _ => ProbeFault::Unreachable(e.to_string()),
        }
    }

    /// Map an I/O error from the handshake read onto a fault.
    pub fn from_read_error(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ProbeFault::ReadTimeout,
            _ => ProbeFault::UnexpectedCloseDuringRead,
        }
    }
}

impl From<std::net::AddrParseError> for ScanError {
    fn from(e: std::net::AddrParseError) -> Self {
        ScanError::InvalidRange(e.to_string())
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(e: toml::de::Error) -> Self {
        ScanError::ConfigError(format!("Failed to parse TOML: {}", e))
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        ScanError::OutputError(e.to_string())
    }
}
