//! Tracing setup: stderr plus an optional daily rolling file

use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vigil_core::{LoggingConfig, LOG_FILE_NAME};

/// Default filter directive for the configured level raised by `-v` flags
pub fn default_directive(level: &str, verbose: u8) -> String {
    let level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    format!(
        "vigild={level},vigil_core={level},vigil_probe={level},vigil_runtime={level},\
         vigil_db={level},vigil_fetch={level},vigil_metrics={level}"
    )
}

/// Install the global subscriber. The returned guard flushes the file writer
/// on drop and must live until exit.
pub fn init(config: &LoggingConfig, verbose: u8) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&config.level, verbose).into());

    let (file_layer, guard) = if config.file {
        match fs::create_dir_all(&config.dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_NAME);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!(
                    "Cannot create log directory {}: {}, logging to stderr only",
                    config.dir.display(),
                    e
                );
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}
