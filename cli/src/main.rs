//! Vigil CLI binary
//!
//! Command-line interface for supervising a single background process.

#![allow(unused_crate_dependencies)]

use clap::{Parser, Subcommand};
use cli::resolve_config_path;
use std::path::PathBuf;
use tracing::{error, info};
use vigil_core::config::load_spec_from_toml_path;
use vigil_core::Supervisor;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Supervise a single background process")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start or adopt the supervised process, then watch it if configured
    Run {
        /// Path to the TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Show whether the supervised process is currently running
    Status {
        /// Path to the TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> cli::Result<()> {
    let cli = Cli::parse();

    vigil_core::utils::init_tracing(&cli.log_level)?;

    let result = match cli.command {
        Commands::Run { config } => run(config).await,
        Commands::Status { config } => status(config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Option<PathBuf>) -> cli::Result<()> {
    let path = resolve_config_path(config);
    let spec = load_spec_from_toml_path(&path)?;
    info!("Loaded config from {:?}", path);

    let mut supervisor = Supervisor::new(spec.clone());
    supervisor.ensure_running().await?;

    if spec.keep_alive {
        let stop = supervisor.stop_handle();
        let watch = supervisor.watch();
        tokio::pin!(watch);
        tokio::select! {
            result = &mut watch => result?,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupt received; stopping watch");
                stop.stop();
                watch.await?;
            }
        }
    } else if spec.wait_for_exit {
        let exit = supervisor.wait_for_exit().await?;
        info!(
            "Process {} exited (code {:?}, signal {:?})",
            exit.pid, exit.exit_code, exit.signal
        );
    }

    Ok(())
}

async fn status(config: Option<PathBuf>) -> cli::Result<()> {
    let path = resolve_config_path(config);
    let spec = load_spec_from_toml_path(&path)?;

    let supervisor = Supervisor::new(spec);
    match supervisor.resolve_existing().await {
        Some(identity) => {
            println!("Process Status:");
            println!("  Command: {}", identity.command);
            println!("  PID: {}", identity.pid);
            println!("  Parent PID: {}", identity.parent_pid);
            println!("  Session: {}", identity.session_id);
            println!("  State: {}", identity.state);
        }
        None => {
            println!("Process not running");
            std::process::exit(1);
        }
    }

    Ok(())
}
