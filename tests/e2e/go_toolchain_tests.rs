//! End-to-end tests against the real Go toolchain
//!
//! Every test returns early when `go` or `gofmt` is not on `PATH`. A cold
//! build cache can make the first `go run` slow, hence the generous limits.

use goexec_sandbox::{ExecutionRequest, ResourceLimits, SandboxService};
use goexec_tests::common::{entry_count, go_service, go_toolchain_available, setup_test_logging};
use std::time::Duration;

const CANONICAL: &str = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hello\")\n}\n";

fn service_or_skip(root: &std::path::Path, timeout: Duration) -> Option<SandboxService> {
    setup_test_logging();
    if !go_toolchain_available() {
        eprintln!("go toolchain not found on PATH, skipping");
        return None;
    }
    Some(go_service(root, ResourceLimits::default().with_timeout(timeout)))
}

#[tokio::test]
async fn test_empty_main_runs_silently() {
    let root = tempfile::tempdir().unwrap();
    let Some(service) = service_or_skip(root.path(), Duration::from_secs(120)) else {
        return;
    };

    let result = service
        .execute(ExecutionRequest::new("package main\nfunc main(){}"))
        .await
        .unwrap();
    assert!(result.success, "{:?}", result);
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "");
    assert_eq!(entry_count(root.path()), 0);
}

#[tokio::test]
async fn test_hello_world() {
    let root = tempfile::tempdir().unwrap();
    let Some(service) = service_or_skip(root.path(), Duration::from_secs(120)) else {
        return;
    };

    let result = service
        .execute(ExecutionRequest::new(CANONICAL))
        .await
        .unwrap();
    assert!(result.success, "{:?}", result);
    assert_eq!(result.stdout, "hello\n");
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_compile_error() {
    let root = tempfile::tempdir().unwrap();
    let Some(service) = service_or_skip(root.path(), Duration::from_secs(120)) else {
        return;
    };

    let result = service
        .execute(ExecutionRequest::new(
            "package main\n\nfunc main() {\n\tundefinedThing()\n}\n",
        ))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.stdout, "");
    assert!(result.stderr.contains("undefined"), "{}", result.stderr);
    assert!(!result.error.unwrap_or_default().is_empty());
    assert_eq!(entry_count(root.path()), 0);
}

#[tokio::test]
async fn test_runtime_panic_keeps_output() {
    let root = tempfile::tempdir().unwrap();
    let Some(service) = service_or_skip(root.path(), Duration::from_secs(120)) else {
        return;
    };

    let code = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"before\")\n\tpanic(\"boom\")\n}\n";
    let result = service.execute(ExecutionRequest::new(code)).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.stdout, "before\n");
    assert!(result.stderr.contains("panic: boom"), "{}", result.stderr);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_infinite_loop_hits_deadline() {
    let root = tempfile::tempdir().unwrap();
    let Some(service) = service_or_skip(root.path(), Duration::from_secs(5)) else {
        return;
    };

    let result = service
        .execute(ExecutionRequest::new("package main\n\nfunc main() {\n\tfor {\n\t}\n}\n"))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("timed out after 5s"));
    assert!(result.execution_ms >= 5000);
    assert_eq!(entry_count(root.path()), 0);
}

#[tokio::test]
async fn test_format_canonicalizes_layout() {
    let root = tempfile::tempdir().unwrap();
    let Some(service) = service_or_skip(root.path(), Duration::from_secs(30)) else {
        return;
    };

    let messy = "package main\n\nimport \"fmt\"\n\nfunc main(){\nfmt.Println( \"hello\" )\n}\n";
    let result = service.format(ExecutionRequest::new(messy)).await.unwrap();
    assert!(result.success, "{:?}", result);
    assert_eq!(result.formatted_code, CANONICAL);
    assert_eq!(entry_count(root.path()), 0);
}

#[tokio::test]
async fn test_format_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let Some(service) = service_or_skip(root.path(), Duration::from_secs(30)) else {
        return;
    };

    let first = service.format(ExecutionRequest::new(CANONICAL)).await.unwrap();
    assert!(first.success);
    assert_eq!(first.formatted_code, CANONICAL);

    let second = service
        .format(ExecutionRequest::new(first.formatted_code.clone()))
        .await
        .unwrap();
    assert_eq!(second.formatted_code, first.formatted_code);
}

#[tokio::test]
async fn test_format_rejects_invalid_syntax() {
    let root = tempfile::tempdir().unwrap();
    let Some(service) = service_or_skip(root.path(), Duration::from_secs(30)) else {
        return;
    };

    let result = service
        .format(ExecutionRequest::new("package main\nfunc main( {"))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.formatted_code.is_empty());
    let error = result.error.unwrap();
    assert!(
        error.starts_with("Failed to format code: exit status 2"),
        "{}",
        error
    );
    assert_eq!(entry_count(root.path()), 0);
}
