//! Vigil Metrics - host and service sampling to daily CSV files

pub mod collector;
pub mod sample;
pub mod system;
pub mod writer;

pub use collector::MetricsCollector;
pub use sample::{header_for, MetricSample, ServiceSample, SystemUsage};
pub use system::{SystemSampler, UsageSource};
pub use writer::DailyCsvWriter;
