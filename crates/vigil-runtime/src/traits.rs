//! Launcher trait and common types

use async_trait::async_trait;
use tokio::process::Child;
use vigil_core::{Result, ServiceDescriptor};

/// A freshly launched process
pub struct LaunchedProcess {
    pub pid: u32,
    /// Handle used only for reaping; `None` when the launcher does not own one
    pub child: Option<Child>,
}

impl LaunchedProcess {
    pub fn new(pid: u32, child: Child) -> Self {
        Self {
            pid,
            child: Some(child),
        }
    }

    pub fn detached(pid: u32) -> Self {
        Self { pid, child: None }
    }
}

/// Trait for starting service processes
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start the service's launch command as an independent process
    async fn launch(&self, service: &ServiceDescriptor) -> Result<LaunchedProcess>;

    /// Get the command that will be executed (for display)
    fn command_string(&self, service: &ServiceDescriptor) -> String {
        service.command_line()
    }
}
