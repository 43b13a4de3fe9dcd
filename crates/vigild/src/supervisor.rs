//! Service supervisor - polls liveness and relaunches dead services

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use vigil_core::{Backoff, RestartEvent, RestartOutcome, ServiceDescriptor, SupervisorConfig};
use vigil_db::EventsRepository;
use vigil_probe::Liveness;
use vigil_runtime::Launcher;

/// A child this supervisor spawned, kept only so it can be reaped
struct TrackedChild {
    pid: u32,
    child: Child,
}

/// Restart attempts since the service was last seen alive
#[derive(Debug, Clone, Copy)]
struct FailureStreak {
    attempts: u32,
    last_attempt: Instant,
}

pub struct Supervisor {
    services: Vec<ServiceDescriptor>,
    liveness: Arc<dyn Liveness>,
    launcher: Arc<dyn Launcher>,
    events: Option<EventsRepository>,
    interval: Duration,
    backoff: Backoff,
    backoff_after: u32,
    children: HashMap<String, Vec<TrackedChild>>,
    streaks: HashMap<String, FailureStreak>,
}

impl Supervisor {
    pub fn new(
        config: &SupervisorConfig,
        services: Vec<ServiceDescriptor>,
        liveness: Arc<dyn Liveness>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            services,
            liveness,
            launcher,
            events: None,
            interval: config.interval(),
            backoff: config.backoff(),
            backoff_after: config.backoff_after,
            children: HashMap::new(),
            streaks: HashMap::new(),
        }
    }

    /// Persist restart events in addition to logging them
    pub fn with_events(mut self, events: EventsRepository) -> Self {
        self.events = Some(events);
        self
    }

    /// Number of spawned children not yet reaped
    pub fn tracked_children(&self) -> usize {
        self.children.values().map(Vec::len).sum()
    }

    /// One poll over every service in registry order
    pub async fn run_cycle(&mut self) -> Vec<RestartEvent> {
        self.reap();

        let services = self.services.clone();
        let mut events = Vec::new();
        for service in &services {
            if let Some(event) = self.check_service(service).await {
                self.record(&event).await;
                events.push(event);
            }
        }
        events
    }

    /// Liveness off the async workers, since the process scan reads all of /proc
    async fn is_alive(&self, service: &ServiceDescriptor) -> bool {
        let liveness = self.liveness.clone();
        let probed = service.clone();
        match tokio::task::spawn_blocking(move || liveness.is_alive(&probed)).await {
            Ok(alive) => alive,
            Err(e) => {
                // A failed probe never triggers a launch
                error!("Liveness check for {} failed: {}", service.name, e);
                true
            }
        }
    }

    async fn check_service(&mut self, service: &ServiceDescriptor) -> Option<RestartEvent> {
        if self.is_alive(service).await {
            if self.streaks.remove(&service.name).is_some() {
                debug!("Service {} is running again", service.name);
            }
            return None;
        }

        debug!("Service {} looks dead, re-checking", service.name);
        if self.is_alive(service).await {
            self.streaks.remove(&service.name);
            return Some(RestartEvent::new(
                &service.name,
                RestartOutcome::SkippedAlreadyRunning,
            ));
        }

        if let Some(wait) = self.deferral(&service.name) {
            return Some(
                RestartEvent::new(&service.name, RestartOutcome::Deferred)
                    .with_detail(format!("next attempt in {}s", wait.as_secs())),
            );
        }

        debug!(
            "Launching {}: {}",
            service.name,
            self.launcher.command_string(service)
        );
        let event = match self.launcher.launch(service).await {
            Ok(launched) => {
                if let Some(child) = launched.child {
                    self.children
                        .entry(service.name.clone())
                        .or_default()
                        .push(TrackedChild {
                            pid: launched.pid,
                            child,
                        });
                }
                RestartEvent::new(&service.name, RestartOutcome::Spawned)
                    .with_detail(format!("pid {}", launched.pid))
            }
            Err(e) => RestartEvent::new(&service.name, RestartOutcome::SpawnFailed)
                .with_detail(e.to_string()),
        };

        let streak = self
            .streaks
            .entry(service.name.clone())
            .or_insert(FailureStreak {
                attempts: 0,
                last_attempt: Instant::now(),
            });
        streak.attempts += 1;
        streak.last_attempt = Instant::now();

        Some(event)
    }

    /// Remaining wait when the service is inside its backoff window
    fn deferral(&self, name: &str) -> Option<Duration> {
        let streak = self.streaks.get(name)?;
        if streak.attempts < self.backoff_after {
            return None;
        }

        let delay = self.backoff.delay(streak.attempts - self.backoff_after);
        let elapsed = streak.last_attempt.elapsed();
        if elapsed < delay {
            Some(delay - elapsed)
        } else {
            None
        }
    }

    async fn record(&self, event: &RestartEvent) {
        let detail = event.detail.as_deref().unwrap_or("");
        match event.outcome {
            RestartOutcome::SpawnFailed => {
                error!("Failed to restart {}: {}", event.service, detail)
            }
            RestartOutcome::Spawned => {
                warn!("Service {} was down, restarted ({})", event.service, detail)
            }
            RestartOutcome::SkippedAlreadyRunning => {
                warn!(
                    "Service {} was down but is running on re-check, not restarting",
                    event.service
                )
            }
            RestartOutcome::Deferred => {
                warn!(
                    "Service {} is down, restart deferred by backoff ({})",
                    event.service, detail
                )
            }
        }

        if let Some(events) = &self.events {
            if let Err(e) = events.record(event).await {
                warn!("Failed to persist restart event for {}: {}", event.service, e);
            }
        }
    }

    /// Drop exited children from the registry
    fn reap(&mut self) {
        for (name, children) in self.children.iter_mut() {
            children.retain_mut(|tracked| match tracked.child.try_wait() {
                Ok(Some(status)) => {
                    info!(
                        "Process {} of service {} exited with {}",
                        tracked.pid, name, status
                    );
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    warn!("Failed to poll process {} of {}: {}", tracked.pid, name, e);
                    false
                }
            });
        }
        self.children.retain(|_, children| !children.is_empty());
    }

    /// Poll until shutdown
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Supervisor started ({} services, every {:?})",
            self.services.len(),
            self.interval
        );

        loop {
            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!(
            "Supervisor stopped, leaving {} spawned processes running",
            self.tracked_children()
        );
    }
}
