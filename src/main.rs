//! Main entry point for the social-capture CLI

use clap::Parser;
use social_capture::cli::{capture, Cli, Commands};
use social_capture::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("social_capture=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C requests shutdown; harvests observe it at page boundaries
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing the current page...");
                shutdown.request_shutdown();
            }
        }
    });

    let result = match &cli.command {
        Commands::Discord(args) => args.execute(&cli, shutdown.clone()).await,
        Commands::Youtube(args) => args.execute(&cli, shutdown.clone()).await,
        Commands::Check => capture::execute_check(&cli, shutdown.clone()).await,
    };

    match result {
        Ok(summary) => {
            let code = summary.exit_code();
            if code != 0 {
                std::process::exit(code);
            }
        }
        Err(e) => {
            error!("command failed: {e}");
            std::process::exit(if shutdown.is_shutdown_requested() { 130 } else { 1 });
        }
    }
}
