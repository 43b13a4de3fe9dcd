//! Command launcher

use async_trait::async_trait;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};
use vigil_core::{Error, Result, ServiceDescriptor};

use crate::traits::{LaunchedProcess, Launcher};

/// Launches the descriptor's command directly (no shell)
#[derive(Debug, Clone, Default)]
pub struct CmdLauncher {
    /// When set, service stdout/stderr are appended to `<name>-out.log` /
    /// `<name>-err.log` here; otherwise they go to /dev/null
    log_dir: Option<PathBuf>,
}

impl CmdLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Verify the program exists before spawning
    pub fn resolve_program(program: &str) -> Result<PathBuf> {
        match which::which(program) {
            Ok(path) => Ok(path),
            Err(_) if Path::new(program).exists() => Ok(PathBuf::from(program)),
            Err(_) => Err(Error::spawn(format!("Command not found: {}", program))),
        }
    }

    fn output(&self, service: &ServiceDescriptor, stream: &str) -> Result<Stdio> {
        match &self.log_dir {
            Some(dir) => {
                let file = open_service_log(dir, &service.name, stream)?;
                Ok(Stdio::from(file))
            }
            None => Ok(Stdio::null()),
        }
    }
}

/// Open (append) a service output log
fn open_service_log(dir: &Path, name: &str, stream: &str) -> Result<File> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}-{}.log", name, stream));
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

#[async_trait]
impl Launcher for CmdLauncher {
    async fn launch(&self, service: &ServiceDescriptor) -> Result<LaunchedProcess> {
        let program = Self::resolve_program(service.program())?;
        debug!("Resolved {} to {}", service.program(), program.display());

        let mut cmd = Command::new(&program);
        cmd.args(service.args())
            .stdin(Stdio::null())
            .stdout(self.output(service, "out")?)
            .stderr(self.output(service, "err")?)
            .kill_on_drop(false);

        if let Some(cwd) = &service.cwd {
            cmd.current_dir(cwd);
        }

        // Own process group: a Ctrl-C aimed at the daemon leaves services running
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| {
            Error::spawn(format!("Failed to start '{}': {}", service.command_line(), e))
        })?;

        let pid = child
            .id()
            .ok_or_else(|| Error::spawn("Process started but no PID available"))?;

        info!("Launched {} with PID {}", service.name, pid);
        Ok(LaunchedProcess::new(pid, child))
    }
}
