//! Core types for Vigil

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex pattern for valid service names: only alphanumeric, underscore, and hyphen
static SERVICE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid service name regex")
});

/// Validate a service name. Names end up in CSV headers and log fields,
/// so only alphanumeric characters, underscores, and hyphens are allowed.
pub fn validate_service_name(name: &str) -> bool {
    !name.is_empty() && SERVICE_NAME_REGEX.is_match(name)
}

/// A service the supervisor keeps alive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Program followed by its arguments
    pub command: Vec<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl ServiceDescriptor {
    /// Create a descriptor, validating the name and command.
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Result<Self> {
        let name = name.into();
        if !validate_service_name(&name) {
            return Err(Error::InvalidServiceName(format!(
                "'{}': only alphanumeric characters, underscores, and hyphens are allowed",
                name
            )));
        }
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(Error::config(format!("Service '{}' has an empty command", name)));
        }

        Ok(Self {
            name,
            command,
            port: None,
            cwd: None,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    /// Program to execute
    pub fn program(&self) -> &str {
        &self.command[0]
    }

    /// Arguments passed to the program
    pub fn args(&self) -> &[String] {
        &self.command[1..]
    }

    /// Launch command joined by spaces, as matched against process command lines
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Ordered, immutable list of supervised services
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<ServiceDescriptor>,
}

impl ServiceRegistry {
    /// Build a registry, rejecting duplicate names
    pub fn new(services: Vec<ServiceDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for service in &services {
            if !seen.insert(service.name.as_str()) {
                return Err(Error::DuplicateService(service.name.clone()));
            }
        }
        Ok(Self { services })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDescriptor> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    /// Resolve a list of names to descriptors, keeping the given order.
    /// An empty list selects the whole registry.
    pub fn select(&self, names: &[String]) -> Result<Vec<ServiceDescriptor>> {
        if names.is_empty() {
            return Ok(self.services.clone());
        }
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| Error::ServiceNotFound(name.clone()))
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ServiceRegistry {
    type Item = &'a ServiceDescriptor;
    type IntoIter = std::slice::Iter<'a, ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.services.iter()
    }
}

/// Outcome of the two liveness signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessResult {
    pub by_port: bool,
    pub by_process: bool,
}

impl LivenessResult {
    pub fn alive(&self) -> bool {
        self.by_port || self.by_process
    }
}

/// What the supervisor did about a dead service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RestartOutcome {
    Spawned,
    SpawnFailed,
    SkippedAlreadyRunning,
    /// Restart held back by the backoff window
    Deferred,
}

impl RestartOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartOutcome::Spawned => "spawned",
            RestartOutcome::SpawnFailed => "spawn_failed",
            RestartOutcome::SkippedAlreadyRunning => "skipped_already_running",
            RestartOutcome::Deferred => "deferred",
        }
    }
}

impl FromStr for RestartOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "spawned" => Ok(RestartOutcome::Spawned),
            "spawn_failed" => Ok(RestartOutcome::SpawnFailed),
            "skipped_already_running" => Ok(RestartOutcome::SkippedAlreadyRunning),
            "deferred" => Ok(RestartOutcome::Deferred),
            _ => Err(Error::db(format!("Unknown restart outcome: {}", s))),
        }
    }
}

impl std::fmt::Display for RestartOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A restart decision taken by the supervisor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestartEvent {
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: RestartOutcome,
    /// PID on spawn, error text on failure
    #[serde(default)]
    pub detail: Option<String>,
}

impl RestartEvent {
    pub fn new(service: impl Into<String>, outcome: RestartOutcome) -> Self {
        Self {
            service: service.into(),
            timestamp: Utc::now(),
            outcome,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

fn default_api_name() -> String {
    "Unknown".to_string()
}

fn default_api_category() -> String {
    "General".to_string()
}

/// Upstream API catalogue record, keyed by `name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEntry {
    #[serde(rename = "API", default = "default_api_name")]
    pub name: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Category", default = "default_api_category")]
    pub category: String,
}

impl ApiEntry {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: category.into(),
        }
    }
}
