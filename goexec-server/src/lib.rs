use anyhow::{Context, Result};
use goexec_sandbox::SandboxService;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

pub mod config;
pub mod http_server;

pub use config::{AppConfig, ServerConfig};
pub use http_server::{create_router, start_server, ApiError, AppState};

pub struct ServerArgs {
    pub config_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
}

pub async fn run_server_app(args: ServerArgs) -> Result<()> {
    let _guard = init_tracing(args.verbose, args.log_file.as_deref())?;

    let config =
        AppConfig::load(args.config_path.as_deref())?.with_bind_addr(args.bind_addr)?;
    let bind_addr = config.bind_addr()?;

    info!("Starting goexec server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Execute command: {} {}",
        config.toolchain.execute.program,
        config.toolchain.execute.args.join(" ")
    );
    info!(
        "Format command: {} {}",
        config.toolchain.format.program,
        config.toolchain.format.args.join(" ")
    );
    info!(
        "Workspace root: {}",
        config.sandbox.provisioner().root().display()
    );

    let service = SandboxService::with_process_runtime(config.sandbox, config.toolchain);
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    http_server::start_server(listener, AppState::new(service), shutdown_signal()).await
}

/// Console logging, plus a plain-text file layer when `log_file` is set.
/// The returned guard flushes the file writer and must outlive the server.
fn init_tracing(
    verbose: bool,
    log_file: Option<&std::path::Path>,
) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = if verbose { "debug" } else { "info" };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path {} has no file name", path.display()))?;

            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "goexec_server={},goexec_sandbox={},tower_http={}",
                    log_level, log_level, log_level
                ))
            }),
        )
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(guard)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
