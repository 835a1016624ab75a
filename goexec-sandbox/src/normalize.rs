//! Mapping raw process outcomes onto the response shapes
//!
//! Both shapes follow one rule: `error` is present exactly when `success`
//! is false.

use crate::types::{ExecutionResult, FormatResult, RunOutput};
use std::io;

/// Build the response for a program run.
///
/// stdout and stderr are passed through untouched apart from lossy UTF-8
/// decoding; the error text describes why the process failed and is kept
/// apart from stderr.
pub fn execution_result(output: RunOutput) -> ExecutionResult {
    let RunOutput {
        stdout,
        stderr,
        elapsed,
        error,
    } = output;

    ExecutionResult {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        execution_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        success: error.is_none(),
        error: error.map(|e| e.to_string()),
    }
}

/// Build the response for a formatter run.
///
/// The formatter's stdout is the formatted code. When it printed nothing the
/// tool may have rewritten the file in place instead, so `read_back` carries
/// the materialized file's content, read before the workspace was released.
pub fn format_result(output: RunOutput, read_back: Option<io::Result<String>>) -> FormatResult {
    if let Some(err) = output.error {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return match stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(detail) => {
                FormatResult::failed(format!("Failed to format code: {}: {}", err, detail))
            }
            None => FormatResult::failed(format!("Failed to format code: {}", err)),
        };
    }

    if !output.stdout.is_empty() {
        return FormatResult::formatted(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    match read_back {
        Some(Ok(code)) if !code.is_empty() => FormatResult::formatted(code),
        Some(Ok(_)) | None => {
            FormatResult::failed("Failed to format code: formatter produced no output")
        }
        Some(Err(e)) => FormatResult::failed(format!("Failed to read formatted file: {}", e)),
    }
}

/// Whether a formatter run needs the in-place fallback
pub fn needs_read_back(output: &RunOutput) -> bool {
    output.succeeded() && output.stdout.is_empty()
}
