//! Daily CSV file writer

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vigil_core::{metrics_path, Result};

use crate::sample::MetricSample;

/// Appends samples to `<dir>/<prefix>_<YYYY-MM-DD>.csv`
#[derive(Debug, Clone)]
pub struct DailyCsvWriter {
    dir: PathBuf,
    prefix: String,
}

impl DailyCsvWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// File for the sample's local date
    pub fn path_for(&self, sample: &MetricSample) -> PathBuf {
        metrics_path(&self.dir, &self.prefix, sample.timestamp.date_naive())
    }

    /// Append one row. A missing or empty file gets the header in the same
    /// write.
    pub fn append(&self, sample: &MetricSample) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(sample);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let header = sample.header();

        let mut buf = String::new();
        if file.metadata()?.len() == 0 {
            buf.push_str(&header);
        } else if let Some(existing) = first_line(&path)? {
            if existing.trim_end() != header.trim_end() {
                warn!(
                    "Metrics header in {} differs from current columns, appending anyway",
                    path.display()
                );
            }
        }
        buf.push_str(&sample.to_row());

        write_all(file, buf.as_bytes())?;
        debug!("Appended metrics row to {}", path.display());
        Ok(path)
    }
}

fn first_line(path: &Path) -> Result<Option<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn write_all(mut file: File, bytes: &[u8]) -> Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    Ok(())
}
