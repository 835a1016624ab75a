//! Sandbox service - main entry point

use crate::config::SandboxConfig;
use crate::error::{ProvisionError, RunError, ServiceError};
use crate::execution::{ExecutionId, ExecutionStage, Lifecycle, Operation};
use crate::limits::ResourceLimits;
use crate::normalize;
use crate::runtime::{ProcessRuntime, Runtime};
use crate::toolchain::{CommandTemplate, Toolchain};
use crate::types::{ExecutionRequest, ExecutionResult, FormatResult, RunOutput};
use crate::workspace::{Workspace, WorkspaceProvisioner};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Runs and formats submitted programs.
///
/// Every call gets its own workspace and at most one child process; the only
/// state shared between calls is the permit pool bounding how many children
/// run at once.
pub struct SandboxService {
    runtime: Arc<dyn Runtime>,
    provisioner: WorkspaceProvisioner,
    toolchain: Toolchain,
    limits: ResourceLimits,
    permits: Semaphore,
}

impl SandboxService {
    /// Create a sandbox service with the given runtime
    pub fn new(
        runtime: impl Runtime + 'static,
        config: SandboxConfig,
        toolchain: Toolchain,
    ) -> Self {
        Self {
            runtime: Arc::new(runtime),
            provisioner: config.provisioner(),
            permits: Semaphore::new(config.limits.max_concurrent),
            limits: config.limits,
            toolchain,
        }
    }

    /// Service backed by plain child processes
    pub fn with_process_runtime(config: SandboxConfig, toolchain: Toolchain) -> Self {
        Self::new(ProcessRuntime::new(), config, toolchain)
    }

    /// Get the runtime name
    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Slots currently free for new children
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop admitting work. Requests already running finish normally;
    /// queued and later ones get [`ServiceError::Closed`].
    pub fn close(&self) {
        if !self.permits.is_closed() {
            tracing::info!("Execution service closed to new requests");
            self.permits.close();
        }
    }

    /// Build and run `request.code` as a complete program.
    ///
    /// Only admission failures are errors; everything that happens to the
    /// program itself is reported in the result.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<ExecutionResult, ServiceError> {
        let _permit = self.admit().await?;
        let mut lifecycle = self.begin(Operation::Execute, &request);

        let mut workspace = match self.prepare(&mut lifecycle, &request.code).await {
            Ok(workspace) => workspace,
            Err(e) => return Ok(ExecutionResult::failed(e.to_string())),
        };

        let output = self
            .launch(&mut lifecycle, &self.toolchain.execute, &workspace)
            .await;

        workspace.release().await;
        lifecycle.advance(ExecutionStage::WorkspaceReleased);

        let result = normalize::execution_result(output);
        lifecycle.advance(ExecutionStage::ResultEmitted);
        tracing::info!(
            execution_id = %lifecycle.id(),
            success = result.success,
            execution_ms = result.execution_ms,
            "Execution finished"
        );
        Ok(result)
    }

    /// Canonically format `request.code`.
    pub async fn format(&self, request: ExecutionRequest) -> Result<FormatResult, ServiceError> {
        let _permit = self.admit().await?;
        let mut lifecycle = self.begin(Operation::Format, &request);

        let mut workspace = match self.prepare(&mut lifecycle, &request.code).await {
            Ok(workspace) => workspace,
            Err(e) => return Ok(FormatResult::failed(e.to_string())),
        };

        let output = self
            .launch(&mut lifecycle, &self.toolchain.format, &workspace)
            .await;

        // must happen before release: the formatter may have rewritten the file
        let read_back = if normalize::needs_read_back(&output) {
            tracing::debug!(
                execution_id = %lifecycle.id(),
                "Formatter printed nothing, reading file back"
            );
            Some(workspace.read_source().await)
        } else {
            None
        };

        workspace.release().await;
        lifecycle.advance(ExecutionStage::WorkspaceReleased);

        let result = normalize::format_result(output, read_back);
        lifecycle.advance(ExecutionStage::ResultEmitted);
        tracing::info!(
            execution_id = %lifecycle.id(),
            success = result.success,
            "Format finished"
        );
        Ok(result)
    }

    async fn admit(&self) -> Result<SemaphorePermit<'_>, ServiceError> {
        let waited = self.limits.queue_timeout;
        match tokio::time::timeout(waited, self.permits.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(ServiceError::Closed),
            Err(_) => {
                tracing::warn!(
                    max_concurrent = self.limits.max_concurrent,
                    waited_ms = waited.as_millis() as u64,
                    "Rejecting request, no execution slot available"
                );
                Err(ServiceError::Busy { waited })
            }
        }
    }

    fn begin(&self, operation: Operation, request: &ExecutionRequest) -> Lifecycle {
        let id = ExecutionId::new();
        tracing::info!(
            execution_id = %id,
            %operation,
            runtime = self.runtime.name(),
            code_len = request.code.len(),
            "Handling request"
        );
        Lifecycle::new(id, operation)
    }

    /// Acquire a workspace and write the code into it. On failure the
    /// workspace is already released and the lifecycle is terminal.
    async fn prepare(
        &self,
        lifecycle: &mut Lifecycle,
        code: &str,
    ) -> Result<Workspace, ProvisionError> {
        let mut workspace = match self.provisioner.acquire(lifecycle.id()).await {
            Ok(workspace) => workspace,
            Err(e) => {
                tracing::error!(
                    execution_id = %lifecycle.id(),
                    error = %e,
                    "Workspace acquisition failed"
                );
                lifecycle.advance(ExecutionStage::ResultEmitted);
                return Err(e);
            }
        };
        lifecycle.advance(ExecutionStage::WorkspaceAcquired);

        if let Err(e) = workspace.materialize(code).await {
            tracing::error!(
                execution_id = %lifecycle.id(),
                error = %e,
                "Materializing source failed"
            );
            workspace.release().await;
            lifecycle.advance(ExecutionStage::WorkspaceReleased);
            lifecycle.advance(ExecutionStage::ResultEmitted);
            return Err(e);
        }
        lifecycle.advance(ExecutionStage::SourceMaterialized);

        Ok(workspace)
    }

    async fn launch(
        &self,
        lifecycle: &mut Lifecycle,
        command: &CommandTemplate,
        workspace: &Workspace,
    ) -> RunOutput {
        let invocation = command.invocation(workspace.source_path(), self.limits.timeout);
        lifecycle.advance(ExecutionStage::ProcessRunning);

        let output = self.runtime.run(&invocation).await;

        lifecycle.advance(match output.error {
            Some(RunError::Spawn { .. }) => ExecutionStage::FailedToStart,
            _ => ExecutionStage::ProcessTerminated,
        });
        output
    }
}
