//! Error types for portsweep.
//!
//! Uses `thiserror` for ergonomic error definitions. Validation failures
//! (`ScanError`) surface before any probe is sent; per-job failures
//! (`ProbeError`) are folded into ERROR-state results and never abort a scan.

use crate::types::{PortError, TargetError};
use std::path::PathBuf;
use thiserror::Error;

/// Pre-scan validation failures.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid timing profile: T{0} (expected 1-5)")]
    InvalidProfile(u8),

    #[error("invalid port specification: {0}")]
    InvalidPortSpec(#[from] PortError),

    #[error("invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no protocols selected")]
    NoProtocols,
}

/// Failure of a single probe. Recorded on the result, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("timed out")]
    Timeout,

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("socket error: {0}")]
    Io(String),

    #[error("probe aborted: {0}")]
    Aborted(String),
}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::TimedOut => Self::Timeout,
            ErrorKind::HostUnreachable | ErrorKind::NetworkUnreachable => {
                Self::Unreachable(e.to_string())
            }
            _ => Self::Io(e.to_string()),
        }
    }
}

/// Errors from loading application settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid settings file: {0}")]
    InvalidFormat(String),
}

/// Errors surfaced by command handlers.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<PortError> for CliError {
    fn from(e: PortError) -> Self {
        Self::Scan(e.into())
    }
}

impl From<TargetError> for CliError {
    fn from(e: TargetError) -> Self {
        Self::Scan(e.into())
    }
}

/// Result type alias for validation steps.
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type alias for settings operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for command handlers.
pub type CliResult<T> = Result<T, CliError>;
