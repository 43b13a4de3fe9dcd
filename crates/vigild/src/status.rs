//! One-shot liveness report

use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};
use vigil_core::{ServiceDescriptor, ServiceRegistry};
use vigil_probe::Liveness;

#[derive(Tabled)]
pub struct StatusRow {
    #[tabled(rename = "name")]
    pub name: String,
    #[tabled(rename = "port")]
    pub port: String,
    #[tabled(rename = "port open")]
    pub by_port: String,
    #[tabled(rename = "process")]
    pub by_process: String,
    #[tabled(rename = "status")]
    pub status: String,
    #[tabled(rename = "mem")]
    pub mem: String,
    #[tabled(rename = "command")]
    pub command: String,
}

/// JSON-friendly status representation
#[derive(Debug, Serialize)]
pub struct StatusJson {
    pub name: String,
    pub port: Option<u16>,
    pub by_port: bool,
    pub by_process: bool,
    pub alive: bool,
    pub memory_bytes: u64,
    pub command: Vec<String>,
}

impl StatusJson {
    pub fn probe(liveness: &dyn Liveness, service: &ServiceDescriptor) -> Self {
        let result = liveness.inspect(service);
        let memory_bytes = if result.by_process {
            liveness.resident_memory(service)
        } else {
            0
        };

        StatusJson {
            name: service.name.clone(),
            port: service.port,
            by_port: result.by_port,
            by_process: result.by_process,
            alive: result.alive(),
            memory_bytes,
            command: service.command.clone(),
        }
    }
}

impl From<&StatusJson> for StatusRow {
    fn from(status: &StatusJson) -> Self {
        let yes_no = |b: bool| (if b { "yes" } else { "no" }).to_string();

        StatusRow {
            name: status.name.clone(),
            port: status
                .port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
            by_port: if status.port.is_some() {
                yes_no(status.by_port)
            } else {
                "-".to_string()
            },
            by_process: yes_no(status.by_process),
            status: if status.alive { "running" } else { "stopped" }.to_string(),
            mem: format_bytes(status.memory_bytes),
            command: status.command.join(" "),
        }
    }
}

/// Probe every service in registry order
pub fn collect(liveness: &dyn Liveness, registry: &ServiceRegistry) -> Vec<StatusJson> {
    registry
        .iter()
        .map(|service| StatusJson::probe(liveness, service))
        .collect()
}

pub fn print(statuses: &[StatusJson], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(statuses)?);
        return Ok(());
    }

    if statuses.is_empty() {
        println!("No services configured");
        return Ok(());
    }

    let rows: Vec<StatusRow> = statuses.iter().map(StatusRow::from).collect();
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(1)).with(Alignment::right()))
        .to_string();

    println!("{}", table);
    Ok(())
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1}gb", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}mb", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}kb", bytes as f64 / KB as f64)
    } else {
        format!("{}b", bytes)
    }
}
