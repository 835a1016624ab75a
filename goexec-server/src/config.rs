use anyhow::{Context, Result};
use goexec_sandbox::{ConfigError, SandboxConfig, Toolchain};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Full server configuration, as read from `goexec.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sandbox: SandboxConfig,
    pub toolchain: Toolchain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or defaults when no path is given.
    /// An explicitly named file that is missing is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        self.sandbox.validate()?;
        self.toolchain.validate()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind_addr.parse().map_err(|e| {
            ConfigError::Invalid(format!(
                "server.bind_addr '{}' is not a socket address: {}",
                self.server.bind_addr, e
            ))
        })
    }

    /// Apply command-line overrides on top of the file values
    pub fn with_bind_addr(mut self, bind_addr: Option<String>) -> Result<Self> {
        if let Some(bind_addr) = bind_addr {
            self.server.bind_addr = bind_addr;
            self.bind_addr().context("Invalid --bind address")?;
        }
        Ok(self)
    }
}
