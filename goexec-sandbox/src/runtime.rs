//! Runtime trait and implementations

mod process;

use crate::types::{Invocation, RunOutput};
use async_trait::async_trait;

pub use process::ProcessRuntime;

/// Launches one external command and reports its raw outcome.
///
/// Implementations never fail the caller: spawn errors, non-zero exits,
/// signals and timeouts are all reported through [`RunOutput::error`] with
/// whatever output was captured. An isolating runtime (restricted user,
/// namespaces, quotas) plugs in here without touching the façades.
#[async_trait]
pub trait Runtime: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> RunOutput;

    /// Get runtime name
    fn name(&self) -> &str;
}
