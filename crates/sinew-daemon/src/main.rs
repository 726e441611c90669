//! Sinew Daemon - Main entry point
//!
//! Builds the configured robot and serves it over REST, and to parent robots
//! over the remote protocol.

mod api;
mod config;
mod server;
mod state;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sinew")]
#[command(about = "Robot composition daemon: resources, remotes, and frames")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sinew.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Bind address for the remote responder
    #[arg(long)]
    remote_bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Build the robot, print its resources and frames, and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Sinew v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;

    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }
    if let Some(remote_bind) = args.remote_bind {
        config.daemon.remote_bind = Some(remote_bind);
    }

    info!(
        components = config.robot.components.len(),
        services = config.robot.services.len(),
        remotes = config.robot.remotes.len(),
        "Configuration loaded"
    );

    sinew_robot::register_builtins(&mut sinew_robot::registry::global().write());

    let state = state::AppState::new(config).await?;

    if args.check {
        let names = state.robot.resource_names().await;
        println!("{} resources:", names.len());
        for name in names {
            println!("  - {}", name);
        }
        for (remote, reason) in state.robot.remote_failures().await {
            println!("  ! remote {} unavailable: {}", remote, reason);
        }
        let fs = state.robot.frame_system(state.robot.name()).await?;
        println!("{} frames:", fs.len());
        for name in fs.frame_names() {
            match fs.parent(&name) {
                Some(parent) => println!("  - {} (parent {})", name, parent.name()),
                None => println!("  - {}", name),
            }
        }
        state.robot.close().await?;
    } else {
        server::run(state).await?;
    }

    Ok(())
}
