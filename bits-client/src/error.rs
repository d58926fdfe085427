//! Error taxonomy for the instrument client.
//!
//! Each variant maps to one [`ErrorKind`] so callers can decide policy by
//! category, e.g. retry only on timeouts and never on validation failures.

use std::path::PathBuf;
use std::time::Duration;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, BitsError>;

/// Coarse category of a [`BitsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected locally before any process was spawned.
    Validation,
    /// A subprocess exceeded its allotted time and was killed.
    Timeout,
    /// Instrument output could not be parsed.
    Parse,
    /// A marker or bound timestamp could not be normalized.
    InvalidTimestamp,
    /// The service configuration violates a structural invariant.
    Config,
    /// Spawning the binary or local file I/O failed.
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum BitsError {
    #[error("export destination {path} must end with '{required_suffix}'")]
    InvalidExportPath {
        path: PathBuf,
        required_suffix: &'static str,
    },

    #[error("{program} timed out after {timeout:?} (pid {pid} killed)")]
    Timeout {
        program: String,
        timeout: Duration,
        pid: u32,
    },

    #[error("failed to parse metrics dump {path}: {source}")]
    MetricsParse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("malformed CSV export at line {line}: {message}")]
    CsvParse { line: u64, message: String },

    #[error("unsupported timestamp {kind} '{value}'")]
    InvalidTimestamp { kind: &'static str, value: String },

    #[error("invalid service configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BitsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidExportPath { .. } => ErrorKind::Validation,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::MetricsParse { .. } | Self::CsvParse { .. } => ErrorKind::Parse,
            Self::InvalidTimestamp { .. } => ErrorKind::InvalidTimestamp,
            Self::InvalidConfig(_) => ErrorKind::Config,
            Self::Spawn { .. } | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether repeating the same call could plausibly succeed.
    ///
    /// Nothing in this crate retries; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub(crate) fn csv(line: u64, message: impl Into<String>) -> Self {
        Self::CsvParse {
            line,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for BitsError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(io) => Self::Io(io),
            other => Self::csv(line, format!("{other:?}")),
        }
    }
}
