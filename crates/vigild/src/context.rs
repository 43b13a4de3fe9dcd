//! Daemon lifecycle: init -> run -> shutdown

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};
use vigil_core::VigilConfig;
use vigil_db::Database;
use vigil_fetch::ResilientFetcher;
use vigil_metrics::{MetricsCollector, SystemSampler};
use vigil_probe::LivenessProbe;
use vigil_runtime::CmdLauncher;

use crate::supervisor::Supervisor;
use crate::sync::{DataSync, SyncService};

/// The periodic loops a daemon can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Supervisor,
    Metrics,
    Sync,
}

impl LoopKind {
    pub const ALL: [LoopKind; 3] = [LoopKind::Supervisor, LoopKind::Metrics, LoopKind::Sync];
}

/// Everything the loops share: config, probe, storage and the shutdown channel
pub struct DaemonContext {
    config: VigilConfig,
    db: Database,
    probe: Arc<LivenessProbe>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DaemonContext {
    /// Open storage and build the shared probe
    pub async fn init(config: VigilConfig, config_path: PathBuf) -> Result<Self> {
        let db = Database::new(&config.storage.path)
            .await
            .with_context(|| format!("opening database {}", config.storage.path.display()))?;

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(
            "Loaded {} services from {}",
            config.registry.len(),
            config_path.display()
        );

        Ok(Self {
            config,
            db,
            probe: Arc::new(LivenessProbe::new()),
            shutdown_tx,
        })
    }

    pub fn supervisor(&self) -> Supervisor {
        let mut launcher = CmdLauncher::new();
        if self.config.supervisor.capture_output {
            launcher = launcher.with_log_dir(&self.config.logging.dir);
        }

        Supervisor::new(
            &self.config.supervisor,
            self.config.registry.iter().cloned().collect(),
            self.probe.clone(),
            Arc::new(launcher),
        )
        .with_events(self.db.events())
    }

    pub fn metrics_collector(&self) -> Result<MetricsCollector> {
        let metrics = &self.config.metrics;
        let services = self.config.registry.select(&metrics.services)?;
        let sampler = SystemSampler::new(&metrics.disk_path, metrics.cpu_window());

        Ok(MetricsCollector::new(
            metrics,
            services,
            Arc::new(sampler),
            self.probe.clone(),
        ))
    }

    pub fn sync_service(&self) -> Result<SyncService> {
        let fetcher = ResilientFetcher::new(&self.config.fetch)?;
        let sync = DataSync::new(self.db.apis(), self.config.sync.max_entries);
        Ok(SyncService::new(&self.config.sync, fetcher, sync))
    }

    fn spawn_loop(&self, kind: LoopKind) -> Result<JoinHandle<()>> {
        let shutdown = self.shutdown_tx.subscribe();

        let handle = match kind {
            LoopKind::Supervisor => {
                let mut supervisor = self.supervisor();
                tokio::spawn(async move { supervisor.run(shutdown).await })
            }
            LoopKind::Metrics => {
                let collector = self.metrics_collector()?;
                tokio::spawn(async move { collector.run(shutdown).await })
            }
            LoopKind::Sync => {
                let service = self.sync_service()?;
                tokio::spawn(async move { service.run(shutdown).await })
            }
        };

        Ok(handle)
    }

    /// Run the given loops until a shutdown signal, then let each finish its
    /// current iteration
    pub async fn run(&self, loops: &[LoopKind]) -> Result<()> {
        let mut handles = Vec::with_capacity(loops.len());
        for kind in loops {
            handles.push((*kind, self.spawn_loop(*kind)?));
        }

        info!("Vigil running ({:?})", loops);
        wait_for_signal().await?;
        self.request_shutdown();

        for (kind, handle) in handles {
            if let Err(e) = handle.await {
                error!("{:?} loop ended abnormally: {}", kind, e);
            }
        }
        Ok(())
    }

    /// Ask every loop to stop after its current iteration
    pub fn request_shutdown(&self) {
        // No receivers simply means no loop is running
        let _ = self.shutdown_tx.send(());
    }

    /// Release storage
    pub async fn shutdown(self) {
        self.db.close().await;
        info!("Vigil shutdown complete");
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down...");
    Ok(())
}
