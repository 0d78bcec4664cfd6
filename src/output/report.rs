//! Run reports
//!
//! Summarises one dispatched batch for saving alongside its output.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

use crate::models::AggregateResponse;

/// Summary of a single dispatched batch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub items: usize,
    pub concurrency: usize,
    pub clock: String,
    pub took_ms: u64,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn from_response<T>(
        response: &AggregateResponse<T>,
        started_at: DateTime<Utc>,
        concurrency: usize,
        clock: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_run_id(started_at),
            started_at,
            items: response.len(),
            concurrency,
            clock: clock.into(),
            took_ms: response.took_millis(),
            succeeded: response.succeeded(),
            failed: response.failed(),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.items == 0 {
            return 100.0;
        }
        (self.succeeded as f64 / self.items as f64) * 100.0
    }

    /// Save report as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = File::create(path).context("Failed to create report file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .context("Failed to write report")?;

        info!("Saved run report to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).context("Failed to open report file")?;
        serde_json::from_reader(BufReader::new(file)).context("Failed to parse report")
    }
}

/// Generate unique run ID
fn generate_run_id(started_at: DateTime<Utc>) -> String {
    let timestamp = started_at.format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}
