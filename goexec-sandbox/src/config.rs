//! Engine configuration

use crate::error::ConfigError;
use crate::limits::ResourceLimits;
use crate::workspace::WorkspaceProvisioner;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[sandbox]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Where workspaces are created (defaults to the OS temp dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// File name the submitted code is written to
    #[serde(default = "SandboxConfig::default_source_file")]
    pub source_file: String,

    #[serde(flatten)]
    pub limits: ResourceLimits,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            source_file: Self::default_source_file(),
            limits: ResourceLimits::default(),
        }
    }
}

impl SandboxConfig {
    fn default_source_file() -> String {
        "main.go".to_string()
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_file.is_empty()
            || self.source_file.contains(std::path::is_separator)
            || self.source_file == "."
            || self.source_file == ".."
        {
            return Err(ConfigError::Invalid(format!(
                "sandbox.source_file must be a plain file name, got {:?}",
                self.source_file
            )));
        }
        if self.limits.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.limits.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Invalid(
                "sandbox.timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn provisioner(&self) -> WorkspaceProvisioner {
        match &self.workspace_root {
            Some(root) => WorkspaceProvisioner::new(root.clone(), self.source_file.clone()),
            None => WorkspaceProvisioner::in_temp_dir(self.source_file.clone()),
        }
    }
}
