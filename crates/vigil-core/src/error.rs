//! Error types for Vigil

use std::path::PathBuf;

/// Vigil error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Duplicate service name: {0}")]
    DuplicateService(String),

    #[error("Invalid service name: {0}")]
    InvalidServiceName(String),

    #[error("Process failed to start: {0}")]
    SpawnFailed(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Database error: {0}")]
    DbError(String),

    #[error("Probe error: {0}")]
    ProbeError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for Vigil
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn db<S: Into<String>>(msg: S) -> Self {
        Error::DbError(msg.into())
    }

    pub fn spawn<S: Into<String>>(msg: S) -> Self {
        Error::SpawnFailed(msg.into())
    }

    pub fn probe<S: Into<String>>(msg: S) -> Self {
        Error::ProbeError(msg.into())
    }

    pub fn metrics<S: Into<String>>(msg: S) -> Self {
        Error::MetricsError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ServiceNotFound("backend".to_string());
        assert_eq!(err.to_string(), "Service not found: backend");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
    }

    #[test]
    fn test_error_helpers() {
        assert!(matches!(Error::spawn("boom"), Error::SpawnFailed(m) if m == "boom"));
        assert!(matches!(Error::db("locked"), Error::DbError(_)));
    }
}
