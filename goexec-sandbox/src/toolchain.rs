//! Command lines bound to each façade

use crate::error::ConfigError;
use crate::types::Invocation;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Replaced by the materialized source path wherever it appears in an argument
pub const SOURCE_PLACEHOLDER: &str = "{source}";

/// A program plus argument template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Expand the template against a materialized source file. The child
    /// starts in the file's directory.
    pub fn invocation(&self, source: &Path, timeout: Option<Duration>) -> Invocation {
        let source_str = source.to_string_lossy();
        Invocation {
            program: self.program.clone(),
            args: self
                .args
                .iter()
                .map(|arg| arg.replace(SOURCE_PLACEHOLDER, &source_str))
                .collect(),
            working_dir: source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(std::env::temp_dir),
            timeout,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "toolchain.{} needs a program",
                name
            )));
        }
        if !self.args.iter().any(|a| a.contains(SOURCE_PLACEHOLDER)) {
            tracing::warn!(
                command = name,
                program = %self.program,
                "Command template never references {}",
                SOURCE_PLACEHOLDER
            );
        }
        Ok(())
    }
}

/// The two external commands the service knows how to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    /// Builds and runs the program (`go run`)
    pub execute: CommandTemplate,
    /// Prints the canonical layout of the program (`gofmt`)
    pub format: CommandTemplate,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::go()
    }
}

impl Toolchain {
    /// The standard Go tools found on `PATH`
    pub fn go() -> Self {
        Self {
            execute: CommandTemplate::new("go", ["run", SOURCE_PLACEHOLDER]),
            format: CommandTemplate::new("gofmt", ["-s", SOURCE_PLACEHOLDER]),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.execute.validate("execute")?;
        self.format.validate("format")
    }
}
