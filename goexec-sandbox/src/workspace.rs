//! Per-request workspaces
//!
//! Every request gets its own directory under the configured root, named
//! `goexec-<uuid>` and created exclusively so concurrent requests can never
//! land in the same place. The directory holds exactly one source file and is
//! removed when the request finishes, on every path: [`Workspace::release`] is
//! called explicitly at the end of a run and `Drop` covers early returns,
//! cancelled futures and panics.

use crate::error::ProvisionError;
use crate::execution::ExecutionId;
use std::io;
use std::path::{Path, PathBuf};

const DIR_PREFIX: &str = "goexec-";
const MAX_NAME_ATTEMPTS: u32 = 8;

/// Hands out fresh workspaces under one root directory
#[derive(Debug, Clone)]
pub struct WorkspaceProvisioner {
    root: PathBuf,
    source_file: String,
}

impl WorkspaceProvisioner {
    pub fn new(root: impl Into<PathBuf>, source_file: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            source_file: source_file.into(),
        }
    }

    /// Provisioner rooted at the OS temp directory
    pub fn in_temp_dir(source_file: impl Into<String>) -> Self {
        Self::new(std::env::temp_dir(), source_file)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// Create a new, empty workspace owned by the caller.
    ///
    /// The first name tried is derived from the execution id so logs and
    /// directories line up; a collision falls back to fresh random names.
    pub async fn acquire(&self, id: ExecutionId) -> Result<Workspace, ProvisionError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(ProvisionError::CreateDir)?;

        let mut name = format!("{}{}", DIR_PREFIX, id);
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let dir = self.root.join(&name);
            match create_private_dir(&dir).await {
                Ok(()) => {
                    tracing::debug!(execution_id = %id, dir = %dir.display(), "Workspace acquired");
                    return Ok(Workspace {
                        id,
                        source_path: dir.join(&self.source_file),
                        dir,
                        released: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::warn!(
                        execution_id = %id,
                        attempt,
                        dir = %dir.display(),
                        "Workspace name collision, retrying"
                    );
                    name = format!("{}{}", DIR_PREFIX, uuid::Uuid::new_v4());
                }
                Err(e) => return Err(ProvisionError::CreateDir(e)),
            }
        }

        Err(ProvisionError::Exhausted {
            root: self.root.clone(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }
}

#[cfg(unix)]
async fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.mode(0o700);
    builder.create(dir).await
}

#[cfg(not(unix))]
async fn create_private_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::create_dir(dir).await
}

/// An exclusively owned directory holding one materialized source file
#[derive(Debug)]
pub struct Workspace {
    id: ExecutionId,
    dir: PathBuf,
    source_path: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where [`Workspace::materialize`] writes the code
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Write the submitted code verbatim to the workspace's source file.
    pub async fn materialize(&self, code: &str) -> Result<PathBuf, ProvisionError> {
        if self.released {
            return Err(ProvisionError::Released(self.dir.clone()));
        }
        tokio::fs::write(&self.source_path, code.as_bytes())
            .await
            .map_err(ProvisionError::WriteSource)?;
        Ok(self.source_path.clone())
    }

    /// Read the source file back, e.g. after a tool rewrote it in place.
    pub async fn read_source(&self) -> io::Result<String> {
        tokio::fs::read_to_string(&self.source_path).await
    }

    /// Remove the workspace and everything in it. Idempotent; failures are
    /// logged and swallowed.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let result = tokio::fs::remove_dir_all(&self.dir).await;
        log_removal(self.id, &self.dir, result);
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let result = std::fs::remove_dir_all(&self.dir);
        log_removal(self.id, &self.dir, result);
    }
}

fn log_removal(id: ExecutionId, dir: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => {
            tracing::debug!(execution_id = %id, dir = %dir.display(), "Workspace released");
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(execution_id = %id, dir = %dir.display(), "Workspace already gone");
        }
        Err(e) => {
            tracing::warn!(
                execution_id = %id,
                dir = %dir.display(),
                error = %e,
                "Failed to remove workspace"
            );
        }
    }
}
