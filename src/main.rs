use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod serve;
mod view;

/// kubelog - A Kubernetes log gateway with a live-following terminal viewer
#[derive(Parser, Debug)]
#[command(name = "kubelog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve container logs from the cluster over HTTP and websockets
    Serve(serve::ServeArgs),

    /// Browse and follow container logs from a running gateway
    View(view::ViewArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve(args) => {
            init_tracing_stderr();
            serve::run(args).await
        }
        Command::View(args) => {
            // The terminal belongs to the UI; logs go to a file or nowhere
            if let Some(path) = &args.log_file {
                init_tracing_file(path)?;
            }
            view::run(args).await
        }
    };

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_tracing_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn init_tracing_file(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}
