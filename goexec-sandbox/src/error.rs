//! Error types for the execution engine

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a child process did not finish cleanly.
///
/// The `Display` text is the diagnostic placed in a result's `error` field,
/// so it describes the failure itself and never repeats the child's stderr.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exit status {code}")]
    Exit { code: i32 },

    #[error("signal: {signal}")]
    Signal { signal: i32 },

    #[error("timed out after {}", humantime_limit(.limit))]
    TimedOut { limit: Duration },

    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),
}

fn humantime_limit(limit: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*limit)
}

/// Failures while preparing a workspace. These never reach the runner.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Failed to create temp directory: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("Failed to create temp directory: no unique name after {attempts} attempts under {}", .root.display())]
    Exhausted { root: PathBuf, attempts: u32 },

    #[error("Failed to write temp file: {0}")]
    WriteSource(#[source] std::io::Error),

    #[error("workspace at {} was already released", .0.display())]
    Released(PathBuf),
}

/// Failures that reject a request before any workspace is touched.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("execution capacity exhausted: no slot freed within {}", humantime_limit(.waited))]
    Busy { waited: Duration },

    #[error("execution service is shutting down")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
