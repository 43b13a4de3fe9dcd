//! Vigil Liveness Probe
//!
//! Decides whether a service is alive from two passive OS-level signals:
//! a socket listening on the service's port, and a running process whose
//! command line contains the service's launch command. Either signal is
//! sufficient. A hung process still reads as alive.

pub mod ports;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};
use tracing::trace;
use vigil_core::{LivenessResult, ServiceDescriptor};

/// Liveness capability shared by the supervisor and the metrics collector
pub trait Liveness: Send + Sync {
    /// Evaluate both signals for a service
    fn inspect(&self, service: &ServiceDescriptor) -> LivenessResult;

    /// Resident memory in bytes of the processes running the service's command
    fn resident_memory(&self, _service: &ServiceDescriptor) -> u64 {
        0
    }

    /// Authoritative liveness decision
    fn is_alive(&self, service: &ServiceDescriptor) -> bool {
        self.inspect(service).alive()
    }
}

/// Probe backed by the kernel socket tables and the process table
pub struct LivenessProbe {
    system: Mutex<System>,
    self_pid: Option<Pid>,
}

impl LivenessProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            self_pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Port signal
    pub fn port_listening(&self, port: u16) -> bool {
        ports::is_listening(port)
    }

    /// Process signal: some other process's command line contains `command_line`
    pub fn process_running(&self, command_line: &str) -> bool {
        !self.matching_processes(command_line).is_empty()
    }

    /// PIDs and resident memory of processes whose command line contains
    /// `command_line`, excluding this process. Threads are listed by the
    /// process table too and would count a process's memory once per thread.
    fn matching_processes(&self, command_line: &str) -> Vec<(Pid, u64)> {
        if command_line.is_empty() {
            return Vec::new();
        }

        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessRefreshKind::new()
                .with_memory()
                .with_cmd(UpdateKind::OnlyIfNotSet),
        );

        system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .filter(|(pid, _)| Some(**pid) != self.self_pid)
            .filter(|(_, process)| {
                let cmd = process.cmd();
                !cmd.is_empty() && cmd.join(" ").contains(command_line)
            })
            .map(|(pid, process)| (*pid, process.memory()))
            .collect()
    }
}

impl Default for LivenessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness for LivenessProbe {
    fn inspect(&self, service: &ServiceDescriptor) -> LivenessResult {
        let by_port = service.port.map(|p| self.port_listening(p)).unwrap_or(false);
        let by_process = self.process_running(&service.command_line());

        trace!(
            "Probe {}: by_port={} by_process={}",
            service.name,
            by_port,
            by_process
        );

        LivenessResult { by_port, by_process }
    }

    fn resident_memory(&self, service: &ServiceDescriptor) -> u64 {
        self.matching_processes(&service.command_line())
            .iter()
            .map(|(_, memory)| memory)
            .sum()
    }
}
