//! goexec sandbox - ephemeral execution engine
//!
//! Takes submitted Go source, writes it into a private per-request workspace,
//! runs one external tool against it with a deadline, and turns whatever
//! happened into a fixed result shape. The workspace is removed on every
//! path out of a request.
//!
//! This is not a security boundary: children run with the server's own
//! privileges. An isolating [`Runtime`] can be swapped in behind the same
//! trait.

mod config;
mod error;
mod execution;
mod limits;
pub mod normalize;
mod runtime;
mod service;
mod toolchain;
mod types;
mod workspace;

pub use config::SandboxConfig;
pub use error::{ConfigError, ProvisionError, RunError, ServiceError};
pub use execution::{ExecutionId, ExecutionStage, Lifecycle, Operation};
pub use limits::ResourceLimits;
pub use runtime::{ProcessRuntime, Runtime};
pub use service::SandboxService;
pub use toolchain::{CommandTemplate, Toolchain, SOURCE_PLACEHOLDER};
pub use types::{ExecutionRequest, ExecutionResult, FormatResult, Invocation, RunOutput};
pub use workspace::{Workspace, WorkspaceProvisioner};
