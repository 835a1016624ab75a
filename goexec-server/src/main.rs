use anyhow::Result;
use clap::Parser;
use goexec_server::{run_server_app, ServerArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "goexec-server")]
#[command(about = "Runs and formats Go snippets in throwaway workspaces")]
#[command(version)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, overriding server.bind_addr
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    run_server_app(ServerArgs {
        config_path: args.config,
        bind_addr: args.bind,
        verbose: args.verbose,
        log_file: args.log_file,
    })
    .await
}
