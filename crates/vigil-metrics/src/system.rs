//! Host usage sampling via sysinfo

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{Disks, System};
use vigil_core::{Error, Result};

use crate::sample::SystemUsage;

/// Source of host-wide usage figures
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn sample(&self) -> Result<SystemUsage>;
}

/// Samples CPU over a short window, memory, and the disk holding `disk_path`
pub struct SystemSampler {
    system: Mutex<System>,
    disk_path: PathBuf,
    cpu_window: Duration,
}

impl SystemSampler {
    pub fn new(disk_path: impl Into<PathBuf>, cpu_window: Duration) -> Self {
        Self {
            system: Mutex::new(System::new()),
            disk_path: disk_path.into(),
            cpu_window: cpu_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    async fn cpu_percent(&self) -> f32 {
        self.system.lock().refresh_cpu();
        tokio::time::sleep(self.cpu_window).await;

        let mut system = self.system.lock();
        system.refresh_cpu();
        system.global_cpu_info().cpu_usage()
    }

    fn memory_percent(&self) -> f32 {
        let mut system = self.system.lock();
        system.refresh_memory();
        percent(system.used_memory(), system.total_memory())
    }

    fn disk_percent(&self) -> Result<f32> {
        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<(&Path, u64, u64)> = disks
            .list()
            .iter()
            .map(|d| (d.mount_point(), d.total_space(), d.available_space()))
            .collect();

        let (_, total, available) = filesystem_for(&self.disk_path, &mounts).ok_or_else(|| {
            Error::metrics(format!(
                "no mounted filesystem holds {}",
                self.disk_path.display()
            ))
        })?;

        Ok(percent(total.saturating_sub(available), total))
    }
}

#[async_trait]
impl UsageSource for SystemSampler {
    async fn sample(&self) -> Result<SystemUsage> {
        let cpu_percent = self.cpu_percent().await;
        let memory_percent = self.memory_percent();
        let disk_percent = self.disk_percent()?;

        Ok(SystemUsage {
            cpu_percent,
            memory_percent,
            disk_percent,
        })
    }
}

/// Mount with the longest mount point that is a prefix of `path`
fn filesystem_for<'a>(
    path: &Path,
    mounts: &[(&'a Path, u64, u64)],
) -> Option<(&'a Path, u64, u64)> {
    mounts
        .iter()
        .filter(|(mount, _, _)| path.starts_with(mount))
        .max_by_key(|(mount, _, _)| mount.as_os_str().len())
        .copied()
}

fn percent(part: u64, whole: u64) -> f32 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 100.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(50, 200), 25.0);
        assert_eq!(percent(200, 200), 100.0);
    }

    #[test]
    fn test_filesystem_for_picks_longest_mount() {
        let mounts = [
            (Path::new("/"), 1000, 500),
            (Path::new("/var"), 100, 10),
            (Path::new("/var/lib/data"), 10, 1),
        ];

        let (mount, _, _) = filesystem_for(Path::new("/var/log"), &mounts).unwrap();
        assert_eq!(mount, Path::new("/var"));

        let (mount, _, _) = filesystem_for(Path::new("/home/user"), &mounts).unwrap();
        assert_eq!(mount, Path::new("/"));

        // Component-wise prefix, not string prefix
        let (mount, _, _) = filesystem_for(Path::new("/variable"), &mounts).unwrap();
        assert_eq!(mount, Path::new("/"));
    }

    #[test]
    fn test_filesystem_for_none() {
        let mounts = [(Path::new("/data"), 10, 5)];
        assert!(filesystem_for(Path::new("/"), &mounts).is_none());
    }

    #[test]
    fn test_memory_percent_in_range() {
        let sampler = SystemSampler::new("/", Duration::from_millis(0));
        let memory = sampler.memory_percent();
        assert!((0.0..=100.0).contains(&memory));
    }
}
