//! Configuration file parsing for Vigil
//!
//! Supports multiple configuration file formats:
//! - TOML (.toml)
//! - YAML (.yaml, .yml)
//! - JSON (.json)

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backoff::Backoff;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::types::{ServiceDescriptor, ServiceRegistry};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Single service entry from the config file
#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub command: Vec<String>,
    pub port: Option<u16>,
    pub cwd: Option<String>,
}

impl ServiceConfig {
    /// Convert to a validated descriptor, resolving `cwd` against `base_dir`
    pub fn into_descriptor(self, base_dir: &Path) -> Result<ServiceDescriptor> {
        let mut descriptor = ServiceDescriptor::new(self.name, self.command)?;
        if let Some(port) = self.port {
            descriptor = descriptor.with_port(port);
        }
        if let Some(cwd) = self.cwd {
            descriptor = descriptor.with_cwd(resolve_path(base_dir, Path::new(&cwd)));
        }
        Ok(descriptor)
    }
}

/// Supervisor loop settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub interval_secs: u64,
    /// Consecutive failed restarts tolerated before backoff applies
    pub backoff_after: u32,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    /// Append service stdout/stderr to `<logging.dir>/<name>-{out,err}.log`
    /// instead of discarding it
    pub capture_output: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SUPERVISOR_INTERVAL_SECS,
            backoff_after: DEFAULT_RESTART_BACKOFF_AFTER,
            backoff_base_secs: DEFAULT_RESTART_BACKOFF_BASE_SECS,
            backoff_max_secs: DEFAULT_RESTART_BACKOFF_MAX_SECS,
            capture_output: false,
        }
    }
}

impl SupervisorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_secs(self.backoff_base_secs),
            Duration::from_secs(self.backoff_max_secs),
        )
    }
}

/// Metrics collector settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub interval_secs: u64,
    pub cpu_window_ms: u64,
    pub dir: PathBuf,
    pub prefix: String,
    /// Watched services; empty means the whole registry
    pub services: Vec<String>,
    pub cpu_threshold: f32,
    pub memory_threshold: f32,
    pub disk_path: PathBuf,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_METRICS_INTERVAL_SECS,
            cpu_window_ms: DEFAULT_CPU_WINDOW_MS,
            dir: PathBuf::from(DEFAULT_METRICS_DIR),
            prefix: DEFAULT_METRICS_PREFIX.to_string(),
            services: Vec::new(),
            cpu_threshold: DEFAULT_CPU_THRESHOLD,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            disk_path: PathBuf::from(DEFAULT_DISK_PATH),
        }
    }
}

impl MetricsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cpu_window(&self) -> Duration {
        Duration::from_millis(self.cpu_window_ms)
    }
}

/// Upstream fetch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub primary_url: String,
    pub fallback_url: Option<String>,
    pub primary_timeout_secs: u64,
    pub fallback_timeout_secs: u64,
    pub max_retries: u32,
    pub pool_max_idle_per_host: usize,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            primary_url: DEFAULT_PRIMARY_URL.to_string(),
            fallback_url: None,
            primary_timeout_secs: DEFAULT_PRIMARY_TIMEOUT_SECS,
            fallback_timeout_secs: DEFAULT_FALLBACK_TIMEOUT_SECS,
            max_retries: DEFAULT_FETCH_RETRIES,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
            retry_max_ms: DEFAULT_RETRY_MAX_MS,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_secs(self.primary_timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.retry_base_ms),
            Duration::from_millis(self.retry_max_ms),
        )
    }
}

/// Fetch + sync loop settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: u64,
    pub max_entries: usize,
    pub backoff_max_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            max_entries: DEFAULT_SYNC_MAX_ENTRIES,
            backoff_max_secs: DEFAULT_SYNC_BACKOFF_MAX_SECS,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Delay schedule after failed cycles, starting at the base interval
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.interval(), Duration::from_secs(self.backoff_max_secs))
    }
}

/// Storage settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub level: String,
    /// Also write to the daily rolling file under `dir`
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOGS_DIR),
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: true,
        }
    }
}

/// Configuration file structure (vigil.toml/yaml/json)
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Validated configuration with paths resolved
#[derive(Debug, Clone)]
pub struct VigilConfig {
    pub registry: ServiceRegistry,
    pub supervisor: SupervisorConfig,
    pub metrics: MetricsConfig,
    pub fetch: FetchConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load config from file, automatically detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::ConfigError(format!(
                "Unsupported config file extension: {}. Expected .toml, .yaml, .yml, or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse config content with specified format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Toml => Ok(toml::from_str(content)?),
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(content)?),
            ConfigFormat::Json => Ok(serde_json::from_str(content)?),
        }
    }

    /// Find and load config file from a directory
    pub fn find_and_load(dir: &Path) -> Result<(Self, PathBuf)> {
        for name in CONFIG_FILES {
            let path = dir.join(name);
            if path.exists() {
                let config = Self::load(&path)?;
                return Ok((config, path));
            }
        }
        Err(Error::ConfigError(format!(
            "No config file found in {}. Expected one of: {:?}",
            dir.display(),
            CONFIG_FILES
        )))
    }

    /// Validate and resolve relative paths against `base_dir`
    pub fn into_config(self, base_dir: &Path) -> Result<VigilConfig> {
        let services = self
            .services
            .into_iter()
            .map(|s| s.into_descriptor(base_dir))
            .collect::<Result<Vec<_>>>()?;
        let registry = ServiceRegistry::new(services)?;

        // Watched names must exist in the registry
        registry.select(&self.metrics.services)?;

        for (section, secs) in [
            ("supervisor.interval_secs", self.supervisor.interval_secs),
            ("metrics.interval_secs", self.metrics.interval_secs),
            ("sync.interval_secs", self.sync.interval_secs),
        ] {
            if secs == 0 {
                return Err(Error::config(format!("{} must be greater than zero", section)));
            }
        }

        if self.fetch.primary_url.trim().is_empty() {
            return Err(Error::config("fetch.primary_url must not be empty"));
        }

        let mut metrics = self.metrics;
        metrics.dir = resolve_path(base_dir, &metrics.dir);
        let mut storage = self.storage;
        storage.path = resolve_path(base_dir, &storage.path);
        let mut logging = self.logging;
        logging.dir = resolve_path(base_dir, &logging.dir);

        // An empty fallback in the file means "no fallback"
        let mut fetch = self.fetch;
        fetch.fallback_url = fetch.fallback_url.filter(|u| !u.trim().is_empty());

        Ok(VigilConfig {
            registry,
            supervisor: self.supervisor,
            metrics,
            fetch,
            sync: self.sync,
            storage,
            logging,
        })
    }
}

impl VigilConfig {
    /// Load an explicit file, or search `dir` for one of the default names.
    /// Relative paths resolve against the config file's directory.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<(Self, PathBuf)> {
        let (file, path) = match explicit {
            Some(path) => (ConfigFile::load(path)?, path.to_path_buf()),
            None => ConfigFile::find_and_load(dir)?,
        };
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.to_path_buf());
        Ok((file.into_config(&base_dir)?, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_format_detection() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("yaml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("yml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_config_parse_toml() {
        let config_content = r#"
[[services]]
name = "frontend"
command = ["python", "app/frontend/server.py"]
port = 8000

[[services]]
name = "data_pipeline"
command = ["python", "scripts/data_integration.py"]
cwd = "pipeline"

[supervisor]
interval_secs = 10

[fetch]
primary_url = "https://example.com/entries"
fallback_url = "https://mirror.example.com/entries"
"#;
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = ConfigFile::load(file.path()).unwrap();
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].port, Some(8000));
        assert_eq!(config.supervisor.interval_secs, 10);
        // Unset fields keep their defaults
        assert_eq!(config.supervisor.backoff_after, DEFAULT_RESTART_BACKOFF_AFTER);
        assert_eq!(config.metrics.interval_secs, DEFAULT_METRICS_INTERVAL_SECS);
        assert_eq!(config.sync.max_entries, DEFAULT_SYNC_MAX_ENTRIES);

        let resolved = config.into_config(Path::new("/srv/vigil")).unwrap();
        assert_eq!(resolved.registry.len(), 2);
        let pipeline = resolved.registry.get("data_pipeline").unwrap();
        assert_eq!(pipeline.cwd, Some(PathBuf::from("/srv/vigil/pipeline")));
        assert_eq!(resolved.storage.path, Path::new("/srv/vigil/data/vigil.db"));
        assert_eq!(resolved.metrics.dir, Path::new("/srv/vigil/metrics"));
        assert_eq!(
            resolved.fetch.fallback_url.as_deref(),
            Some("https://mirror.example.com/entries")
        );
    }

    #[test]
    fn test_config_parse_yaml() {
        let config_content = r#"
services:
  - name: backend
    command: ["python", "app/backend/app.py"]
    port: 5000
metrics:
  services: ["backend"]
  cpu_threshold: 90
"#;
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = ConfigFile::load(file.path()).unwrap();
        assert_eq!(config.services[0].name, "backend");
        assert_eq!(config.metrics.services, vec!["backend"]);
        assert!((config.metrics.cpu_threshold - 90.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_parse_json() {
        let config_content = r#"
{
    "services": [
        { "name": "monitoring", "command": ["python", "scripts/monitoring.py"] }
    ],
    "sync": { "interval_secs": 60, "max_entries": 25 }
}
"#;
        let config = ConfigFile::parse(config_content, ConfigFormat::Json).unwrap();
        assert_eq!(config.services[0].port, None);
        assert_eq!(config.sync.interval_secs, 60);
        assert_eq!(config.sync.max_entries, 25);
    }

    #[test]
    fn test_config_not_found() {
        let result = ConfigFile::load(Path::new("/nonexistent/vigil.toml"));
        assert!(matches!(result, Err(Error::ConfigNotFound(_))));
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let content = r#"
[[services]]
name = "svc"
command = ["a"]

[[services]]
name = "svc"
command = ["b"]
"#;
        let config = ConfigFile::parse(content, ConfigFormat::Toml).unwrap();
        assert!(matches!(
            config.into_config(Path::new("/")),
            Err(Error::DuplicateService(_))
        ));
    }

    #[test]
    fn test_unknown_watched_service_rejected() {
        let content = r#"
[[services]]
name = "svc"
command = ["a"]

[metrics]
services = ["ghost"]
"#;
        let config = ConfigFile::parse(content, ConfigFormat::Toml).unwrap();
        assert!(matches!(
            config.into_config(Path::new("/")),
            Err(Error::ServiceNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let content = "[supervisor]\ninterval_secs = 0\n";
        let config = ConfigFile::parse(content, ConfigFormat::Toml).unwrap();
        assert!(matches!(config.into_config(Path::new("/")), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_empty_fallback_is_none() {
        let content = "[fetch]\nfallback_url = \"  \"\n";
        let config = ConfigFile::parse(content, ConfigFormat::Toml).unwrap();
        let resolved = config.into_config(Path::new("/")).unwrap();
        assert!(resolved.fetch.fallback_url.is_none());
    }

    #[test]
    fn test_find_and_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("vigil.yml"),
            "services:\n  - name: svc\n    command: [\"run\", \"svc\"]\n",
        )
        .unwrap();

        let (config, path) = VigilConfig::load(None, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("vigil.yml"));
        assert_eq!(config.registry.names(), vec!["svc"]);
        assert_eq!(config.logging.dir, dir.path().join("logs"));
    }

    #[test]
    fn test_find_and_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            VigilConfig::load(None, dir.path()),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_fetch_defaults() {
        let fetch = FetchConfig::default();
        assert_eq!(fetch.primary_timeout(), Duration::from_secs(10));
        assert_eq!(fetch.fallback_timeout(), Duration::from_secs(15));
        assert_eq!(fetch.max_retries, 5);
        assert_eq!(fetch.user_agent, USER_AGENT);
    }
}
