use clap::Parser;
use fleetlog_core::{Engine, FleetConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "fleetlog-server", version, about = "HTTP server for the fleetlog trip engine")]
struct Cli {
    /// Path to the config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Store directory (overrides the config file).
    #[arg(long)]
    store: Option<String>,

    /// Address to listen on (overrides the config file).
    #[arg(long)]
    bind: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FLEETLOG_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(FleetConfig::default_path);
    let mut config = match FleetConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(store) = cli.store {
        config.store = store;
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    info!("starting fleetlog-server on {}", config.bind);
    info!("store directory: {}", config.store_path().display());

    let engine = match Engine::from_config(&config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    match fleetlog_server::run_server(&engine, &config.bind) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
