//! Constants and default values for Vigil

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Default config file names to search for (in priority order)
pub const CONFIG_FILES: &[&str] = &[
    "vigil.toml",
    "vigil.yaml",
    "vigil.yml",
    "vigil.json",
];

/// Environment variable that points at an explicit config file
pub const CONFIG_ENV: &str = "VIGIL_CONFIG";

/// User-Agent sent with every upstream request
pub const USER_AGENT: &str = concat!("vigil/", env!("CARGO_PKG_VERSION"));

/// Default supervisor poll interval in seconds
pub const DEFAULT_SUPERVISOR_INTERVAL_SECS: u64 = 30;

/// Consecutive failed restarts before restart backoff kicks in
pub const DEFAULT_RESTART_BACKOFF_AFTER: u32 = 3;

/// Base restart backoff in seconds
pub const DEFAULT_RESTART_BACKOFF_BASE_SECS: u64 = 30;

/// Restart backoff ceiling in seconds
pub const DEFAULT_RESTART_BACKOFF_MAX_SECS: u64 = 600;

/// Default metrics collection interval in seconds
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 60;

/// Default CPU sampling window in milliseconds
pub const DEFAULT_CPU_WINDOW_MS: u64 = 1000;

/// Default metrics directory
pub const DEFAULT_METRICS_DIR: &str = "metrics";

/// Default metrics file prefix
pub const DEFAULT_METRICS_PREFIX: &str = "vigil_metrics";

/// CPU percent above which a warning is logged
pub const DEFAULT_CPU_THRESHOLD: f32 = 80.0;

/// Memory percent above which a warning is logged
pub const DEFAULT_MEMORY_THRESHOLD: f32 = 80.0;

/// Filesystem whose usage is sampled
pub const DEFAULT_DISK_PATH: &str = "/";

/// Default upstream endpoint
pub const DEFAULT_PRIMARY_URL: &str = "https://api.publicapis.org/entries";

/// Primary endpoint timeout in seconds
pub const DEFAULT_PRIMARY_TIMEOUT_SECS: u64 = 10;

/// Fallback endpoint timeout in seconds
pub const DEFAULT_FALLBACK_TIMEOUT_SECS: u64 = 15;

/// Transport-level retries per endpoint
pub const DEFAULT_FETCH_RETRIES: u32 = 5;

/// Idle connections kept per host
pub const DEFAULT_POOL_MAX_IDLE: usize = 10;

/// First retry delay in milliseconds
pub const DEFAULT_RETRY_BASE_MS: u64 = 250;

/// Retry delay ceiling in milliseconds
pub const DEFAULT_RETRY_MAX_MS: u64 = 5000;

/// Default sync interval in seconds
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Entries kept from each upstream payload
pub const DEFAULT_SYNC_MAX_ENTRIES: usize = 10;

/// Sync loop backoff ceiling in seconds
pub const DEFAULT_SYNC_BACKOFF_MAX_SECS: u64 = 3600;

/// Default database path
pub const DEFAULT_DB_PATH: &str = "data/vigil.db";

/// Default log directory
pub const DEFAULT_LOGS_DIR: &str = "logs";

/// Daemon log file name (rotated daily)
pub const LOG_FILE_NAME: &str = "vigild.log";

/// Default log level when RUST_LOG is unset
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Resolve a possibly relative path against a base directory
pub fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Get the daily metrics file path
pub fn metrics_path(dir: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}_{}.csv", prefix, date.format("%Y-%m-%d")))
}
