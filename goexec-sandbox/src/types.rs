//! Core types for sandbox execution

use crate::error::RunError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Request to execute or format code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The complete Go program
    pub code: String,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// Result of running a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock duration of the child process in whole milliseconds
    pub execution_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success: bool,
}

impl ExecutionResult {
    /// A run that never reached the process runner
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            execution_ms: 0,
            error: Some(error.into()),
            success: false,
        }
    }
}

/// Result of formatting a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatResult {
    #[serde(default)]
    pub formatted_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success: bool,
}

impl FormatResult {
    pub fn formatted(code: String) -> Self {
        Self {
            formatted_code: code,
            error: None,
            success: true,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            formatted_code: String::new(),
            error: Some(error.into()),
            success: false,
        }
    }
}

/// One external command to launch
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Directory the child starts in
    pub working_dir: PathBuf,
    /// Upper bound on wall-clock lifetime (None = unbounded)
    pub timeout: Option<Duration>,
}

/// Raw outcome of one process run, before normalization
#[derive(Debug)]
pub struct RunOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
    pub error: Option<RunError>,
}

impl RunOutput {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
