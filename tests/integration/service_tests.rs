//! Integration tests for the execution engine
//!
//! These drive `SandboxService` with `/bin/sh` command templates so they run
//! without a Go toolchain. They verify that:
//! - concurrent requests never see each other's output
//! - no workspace outlives its request, on any outcome
//! - results honour the success contract
//! - reported execution time brackets the child's real run time

use futures::future::join_all;
use goexec_sandbox::{
    CommandTemplate, ExecutionRequest, ResourceLimits, SandboxService, ServiceError, Toolchain,
};
use goexec_tests::common::{entry_count, sandbox_config, setup_test_logging, sh_service};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    setup_test_logging();
    let root = tempfile::tempdir().unwrap();
    let service = Arc::new(sh_service(
        root.path(),
        ResourceLimits::default().with_max_concurrent(16),
    ));

    let requests = (0..24).map(|i| {
        let service = service.clone();
        async move {
            // Each script also checks it is alone in its workspace
            let code = format!(
                "echo out-{i}; echo err-{i} >&2; ls \"$(dirname \"$1\")\" | wc -l | tr -d ' '"
            );
            (i, service.execute(ExecutionRequest::new(code)).await)
        }
    });

    for (i, result) in join_all(requests).await {
        let result = result.unwrap();
        assert!(result.success, "request {} failed: {:?}", i, result);
        assert_eq!(result.stdout, format!("out-{}\n1\n", i));
        assert_eq!(result.stderr, format!("err-{}\n", i));
    }

    assert_eq!(entry_count(root.path()), 0);
}

#[tokio::test]
async fn test_no_workspace_survives_any_outcome() {
    setup_test_logging();
    let root = tempfile::tempdir().unwrap();
    let service = sh_service(
        root.path(),
        ResourceLimits::default().with_timeout(Duration::from_millis(300)),
    );

    // success
    let result = service.execute(ExecutionRequest::new("echo ok")).await.unwrap();
    assert!(result.success);
    assert_eq!(entry_count(root.path()), 0);

    // non-zero exit
    let result = service.execute(ExecutionRequest::new("exit 7")).await.unwrap();
    assert_eq!(result.error.as_deref(), Some("exit status 7"));
    assert_eq!(entry_count(root.path()), 0);

    // deadline
    let result = service.execute(ExecutionRequest::new("sleep 5")).await.unwrap();
    assert_eq!(result.error.as_deref(), Some("timed out after 300ms"));
    assert_eq!(entry_count(root.path()), 0);

    // format success and failure
    let result = service.format(ExecutionRequest::new("  x\n")).await.unwrap();
    assert!(result.success);
    let result = service.format(ExecutionRequest::new("")).await.unwrap();
    assert!(!result.success);
    assert_eq!(entry_count(root.path()), 0);
}

#[tokio::test]
async fn test_missing_toolchain_reports_failure() {
    let root = tempfile::tempdir().unwrap();
    let config = sandbox_config(root.path(), ResourceLimits::default());
    let toolchain = Toolchain {
        execute: CommandTemplate::new("goexec-no-such-tool", ["{source}"]),
        format: CommandTemplate::new("goexec-no-such-tool", ["{source}"]),
    };
    let service = SandboxService::with_process_runtime(config, toolchain);

    let result = service.execute(ExecutionRequest::new("x")).await.unwrap();
    assert!(!result.success);
    assert!(result.stdout.is_empty());
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("goexec-no-such-tool"));

    let result = service.format(ExecutionRequest::new("x")).await.unwrap();
    assert!(!result.success);
    assert!(result.formatted_code.is_empty());
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .starts_with("Failed to format code: "));

    assert_eq!(entry_count(root.path()), 0);
}

#[tokio::test]
async fn test_success_contract() {
    let root = tempfile::tempdir().unwrap();
    let service = sh_service(root.path(), ResourceLimits::default());

    for code in ["true", "false", "echo a", "echo b >&2; exit 1", "kill -9 $$"] {
        let result = service.execute(ExecutionRequest::new(code)).await.unwrap();
        assert_eq!(result.success, result.error.is_none(), "code: {}", code);
    }

    for code in ["  a\n", "", "\n\n"] {
        let result = service.format(ExecutionRequest::new(code)).await.unwrap();
        assert_eq!(result.success, result.error.is_none(), "code: {:?}", code);
        assert_eq!(result.success, !result.formatted_code.is_empty());
    }
}

#[tokio::test]
async fn test_execution_time_is_sane() {
    let root = tempfile::tempdir().unwrap();
    let service = sh_service(root.path(), ResourceLimits::default());

    let started = Instant::now();
    let result = service
        .execute(ExecutionRequest::new("sleep 0.3"))
        .await
        .unwrap();
    let wall = started.elapsed();

    assert!(result.success);
    assert!(result.execution_ms >= 300, "executionMs = {}", result.execution_ms);
    assert!(u128::from(result.execution_ms) <= wall.as_millis());
}

#[tokio::test]
async fn test_admission_rejects_when_saturated() {
    let root = tempfile::tempdir().unwrap();
    let service = Arc::new(sh_service(
        root.path(),
        ResourceLimits::default()
            .with_max_concurrent(2)
            .with_queue_timeout(Duration::from_millis(100)),
    ));

    let slow: Vec<_> = (0..2)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.execute(ExecutionRequest::new("sleep 1")).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(service.available_slots(), 0);

    let rejected = service.execute(ExecutionRequest::new("echo late")).await;
    assert!(matches!(rejected, Err(ServiceError::Busy { .. })));

    for handle in slow {
        assert!(handle.await.unwrap().unwrap().success);
    }
    assert_eq!(service.available_slots(), 2);

    // Capacity is back once the slow requests finished
    let result = service.execute(ExecutionRequest::new("echo late")).await.unwrap();
    assert_eq!(result.stdout, "late\n");
    assert_eq!(entry_count(root.path()), 0);
}
