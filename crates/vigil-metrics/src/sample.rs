//! Metric sample and its CSV rendering

use chrono::{DateTime, Local};

/// Host-wide usage percentages
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemUsage {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
}

/// Status of one watched service at sample time
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSample {
    pub name: String,
    pub running: bool,
    pub memory_mb: f64,
}

impl ServiceSample {
    pub fn status(&self) -> &'static str {
        if self.running {
            "running"
        } else {
            "stopped"
        }
    }
}

/// One row of the daily metrics file
#[derive(Debug, Clone)]
pub struct MetricSample {
    pub timestamp: DateTime<Local>,
    pub usage: SystemUsage,
    pub services: Vec<ServiceSample>,
}

impl MetricSample {
    /// Header line matching this sample's service columns
    pub fn header(&self) -> String {
        header_for(self.services.iter().map(|s| s.name.as_str()))
    }

    /// CSV row, newline terminated
    pub fn to_row(&self) -> String {
        let mut row = format!(
            "{},{:.1},{:.1},{:.1}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.usage.cpu_percent,
            self.usage.memory_percent,
            self.usage.disk_percent
        );
        for service in &self.services {
            row.push_str(&format!(",{},{:.2}", service.status(), service.memory_mb));
        }
        row.push('\n');
        row
    }

    pub fn stopped(&self) -> impl Iterator<Item = &ServiceSample> {
        self.services.iter().filter(|s| !s.running)
    }
}

/// Header line for the given watched service names, newline terminated.
/// Service names are restricted to `[A-Za-z0-9_-]` so no quoting is needed.
pub fn header_for<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut header = String::from("timestamp,cpu_percent,memory_percent,disk_percent");
    for name in names {
        header.push_str(&format!(",{}_status,{}_memory_mb", name, name));
    }
    header.push('\n');
    header
}
