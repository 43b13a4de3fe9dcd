//! Periodic metrics collection loop

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use vigil_core::{Error, MetricsConfig, Result, ServiceDescriptor};
use vigil_probe::Liveness;

use crate::sample::{MetricSample, ServiceSample};
use crate::system::UsageSource;
use crate::writer::DailyCsvWriter;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Samples the host and the watched services, one CSV row per cycle
pub struct MetricsCollector {
    usage: Arc<dyn UsageSource>,
    liveness: Arc<dyn Liveness>,
    writer: DailyCsvWriter,
    services: Vec<ServiceDescriptor>,
    cpu_threshold: f32,
    memory_threshold: f32,
    interval: Duration,
}

impl MetricsCollector {
    pub fn new(
        config: &MetricsConfig,
        services: Vec<ServiceDescriptor>,
        usage: Arc<dyn UsageSource>,
        liveness: Arc<dyn Liveness>,
    ) -> Self {
        Self {
            usage,
            liveness,
            writer: DailyCsvWriter::new(&config.dir, &config.prefix),
            services,
            cpu_threshold: config.cpu_threshold,
            memory_threshold: config.memory_threshold,
            interval: config.interval(),
        }
    }

    pub fn writer(&self) -> &DailyCsvWriter {
        &self.writer
    }

    /// Take one sample, append it, and log threshold breaches
    pub async fn collect_once(&self) -> Result<MetricSample> {
        let usage = self.usage.sample().await?;

        let liveness = self.liveness.clone();
        let watched = self.services.clone();
        let services = tokio::task::spawn_blocking(move || sample_services(&*liveness, &watched))
            .await
            .map_err(|e| Error::metrics(format!("service sampling failed: {}", e)))?;

        let sample = MetricSample {
            timestamp: Local::now(),
            usage,
            services,
        };

        self.writer.append(&sample)?;
        self.report(&sample);
        Ok(sample)
    }

    fn report(&self, sample: &MetricSample) {
        let usage = &sample.usage;

        if usage.cpu_percent > self.cpu_threshold {
            warn!(
                "High CPU usage: {:.1}% (threshold {:.1}%)",
                usage.cpu_percent, self.cpu_threshold
            );
        }
        if usage.memory_percent > self.memory_threshold {
            warn!(
                "High memory usage: {:.1}% (threshold {:.1}%)",
                usage.memory_percent, self.memory_threshold
            );
        }
        for service in sample.stopped() {
            error!("Service {} is not running", service.name);
        }

        info!(
            "Metrics: cpu {:.1}%, memory {:.1}%, disk {:.1}%, {}/{} services running",
            usage.cpu_percent,
            usage.memory_percent,
            usage.disk_percent,
            sample.services.len() - sample.stopped().count(),
            sample.services.len()
        );
    }

    /// Collect until shutdown. A failed cycle loses its sample only.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Metrics collector started ({} services, every {:?})",
            self.services.len(),
            self.interval
        );

        loop {
            if let Err(e) = self.collect_once().await {
                error!("Metrics collection failed: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!("Metrics collector stopped");
    }
}

/// Status and memory of each watched service; scans the process table
fn sample_services(liveness: &dyn Liveness, services: &[ServiceDescriptor]) -> Vec<ServiceSample> {
    services
        .iter()
        .map(|service| {
            let running = liveness.is_alive(service);
            let memory_mb = if running {
                liveness.resident_memory(service) as f64 / BYTES_PER_MIB
            } else {
                0.0
            };
            ServiceSample {
                name: service.name.clone(),
                running,
                memory_mb,
            }
        })
        .collect()
}
