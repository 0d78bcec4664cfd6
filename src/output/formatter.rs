//! Output formatters for aggregate responses
//!
//! Provides JSON, table, CSV and summary output formats.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Debug;

use crate::models::{AggregateResponse, ItemOutcome, ResponseItem};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Response formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a whole aggregate response
    pub fn format_response<T: Serialize + Debug>(
        &self,
        response: &AggregateResponse<T>,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.format_table(response)),
            OutputFormat::Json => {
                serde_json::to_string(response).context("Failed to serialize response")
            }
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(response).context("Failed to serialize response")
            }
            OutputFormat::Csv => format_csv(response),
            OutputFormat::Summary => Ok(format_summary(response)),
        }
    }

    fn format_table<T: Debug>(&self, response: &AggregateResponse<T>) -> String {
        let mut output = String::new();
        output.push_str(&format!("{:>5}  {:10}  {}\n", "#", "STATUS", "DETAIL"));
        output.push_str(&format!("{:-<60}\n", ""));
        for item in response.iter() {
            output.push_str(&self.format_item_row(item));
            output.push('\n');
        }
        output.push_str(&format!("{:-<60}\n", ""));
        output.push_str(&format_summary(response));
        output
    }

    fn format_item_row<T: Debug>(&self, item: &ResponseItem<T>) -> String {
        let (status, detail) = match &item.outcome {
            ItemOutcome::Success(value) => ("✓ SUCCESS", format!("{value:?}")),
            ItemOutcome::Failure(err) => ("✗ FAILURE", format!("{err:#}")),
        };

        let status = if self.colorize {
            let color = if item.outcome.is_success() { 32 } else { 31 };
            format!("\x1b[{color}m{status:10}\x1b[0m")
        } else {
            format!("{status:10}")
        };

        format!("{:>5}  {}  {}", item.index, status, detail)
    }
}

fn format_summary<T>(response: &AggregateResponse<T>) -> String {
    format!(
        "Took: {}ms  Items: {}  Succeeded: {}  Failed: {}",
        response.took_millis(),
        response.len(),
        response.succeeded(),
        response.failed()
    )
}

fn format_csv<T: Serialize>(response: &AggregateResponse<T>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["index", "status", "response", "error"])?;

    for item in response.iter() {
        let (value, error) = match &item.outcome {
            ItemOutcome::Success(value) => (
                serde_json::to_string(value).context("Failed to serialize item")?,
                String::new(),
            ),
            ItemOutcome::Failure(err) => (String::new(), format!("{err:#}")),
        };
        writer.write_record([
            item.index.to_string(),
            item.outcome.status().to_string(),
            value,
            error,
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}
