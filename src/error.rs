//! Custom error types for the monitor.
//!
//! This module defines the primary error type, `MonitorError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different kinds of failures a scan cycle can
//! hit, from filesystem selection coming up empty to a malformed filterbank
//! header or an unreachable store.
//!
//! Every per-cycle error is caught at the cycle boundary in
//! [`crate::monitor`], logged, and swallowed; only startup-time failures
//! (configuration, store connect) are allowed to terminate the process.

use std::path::PathBuf;

use thiserror::Error;

use crate::scanner::BeamKind;

/// Convenience alias for results using the application error type.
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

/// All failure modes of the scan-compute-publish pipeline.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("no recording directory found under {}", .root.display())]
    NoDirectoryFound { root: PathBuf },

    #[error("no {beam} beam directory found in {}", .dir.display())]
    NoBeamDirectory { beam: BeamKind, dir: PathBuf },

    #[error(
        "{beam} beam directory {} holds {found} candidate file(s); \
         at least two are needed before one can be considered complete",
        .dir.display()
    )]
    InsufficientFiles {
        beam: BeamKind,
        dir: PathBuf,
        found: usize,
    },

    #[error("malformed filterbank file {}: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("configuration validation error: {0}")]
    Configuration(String),
}

impl MonitorError {
    /// Build a `Format` error for `path` from anything displayable.
    pub fn format(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        MonitorError::Format {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<figment::Error> for MonitorError {
    fn from(err: figment::Error) -> Self {
        MonitorError::Config(Box::new(err))
    }
}
