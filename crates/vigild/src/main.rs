//! Vigil Daemon - service keeper, metrics sampler and catalogue sync

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use vigil_core::VigilConfig;
use vigil_db::Database;
use vigil_probe::LivenessProbe;

mod cli;
mod context;
mod logging;
mod status;
mod supervisor;
mod sync;

use cli::{Cli, Commands};
use context::{DaemonContext, LoopKind};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir()?;
    let (config, config_path) = VigilConfig::load(cli.config.as_deref(), &cwd)?;

    // Held until exit so buffered file logs are flushed
    let _guard = logging::init(&config.logging, cli.verbose);

    let result = match cli.command() {
        Commands::Status => {
            let probe = LivenessProbe::new();
            let statuses = status::collect(&probe, &config.registry);
            status::print(&statuses, cli.json)
        }
        Commands::InitDb => {
            let db = Database::new(&config.storage.path).await?;
            db.close().await;
            println!("Database initialized at {}", config.storage.path.display());
            Ok(())
        }
        Commands::Sync { once: true } => {
            let ctx = DaemonContext::init(config, config_path).await?;
            let result = ctx.sync_service()?.sync_once().await;
            ctx.shutdown().await;
            result.map(|applied| info!("Synced {} catalogue entries", applied))
        }
        command => {
            let loops: &[LoopKind] = match command {
                Commands::Supervise => &[LoopKind::Supervisor],
                Commands::Monitor => &[LoopKind::Metrics],
                Commands::Sync { .. } => &[LoopKind::Sync],
                _ => &LoopKind::ALL,
            };

            info!("Vigil daemon starting...");
            let ctx = DaemonContext::init(config, config_path).await?;
            let result = ctx.run(loops).await;
            ctx.shutdown().await;
            result
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
