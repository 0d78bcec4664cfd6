//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand, ValueEnum};

use batch_dispatch::config::{ConfigFile, DispatchConfig};
use batch_dispatch::utils::logger::LogLevel;

/// Concurrent batch dispatcher with took-time reporting
#[derive(Parser, Debug)]
#[command(name = "batch-dispatch")]
#[command(version)]
#[command(about = "Dispatch batches of independent items concurrently and report took time")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the first one found in standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

impl Args {
    /// `--verbose` wins; an unknown configured level falls back to info
    pub fn log_level(&self, config: &DispatchConfig) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            config.log_level().unwrap_or(LogLevel::Info)
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dispatch a simulated batch
    Run(RunArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Clock used to measure took time
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ClockKind {
    /// Real monotonic clock
    Real,
    /// Fixed took time, set as each item is dequeued
    Controlled,
}

impl ClockKind {
    pub fn name(&self) -> &'static str {
        match self {
            ClockKind::Real => "real",
            ClockKind::Controlled => "controlled",
        }
    }
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Number of items in the batch
    #[arg(short, long)]
    pub items: Option<usize>,

    /// Maximum concurrently running items
    #[arg(short = 'n', long)]
    pub concurrent: Option<usize>,

    /// Execution time per item in milliseconds
    #[arg(short, long)]
    pub delay_ms: Option<u64>,

    /// Random extra time per item, up to this many milliseconds
    #[arg(short, long)]
    pub jitter_ms: Option<u64>,

    /// Fail every Nth item (0 disables failures)
    #[arg(long)]
    pub fail_every: Option<usize>,

    /// Clock used to measure took time
    #[arg(long, value_enum, default_value = "real")]
    pub clock: ClockKind,

    /// Took time reported with the controlled clock, in milliseconds
    #[arg(long, default_value = "1")]
    pub controlled_took_ms: u64,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Save a run report to file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl RunArgs {
    /// Overlay command-line values on the loaded configuration
    pub fn apply_to(&self, config: &mut ConfigFile) {
        if let Some(items) = self.items {
            config.run.items = items;
        }
        if let Some(n) = self.concurrent {
            config.dispatch.max_concurrent = Some(n);
        }
        if let Some(ms) = self.delay_ms {
            config.run.delay_ms = ms;
        }
        if let Some(ms) = self.jitter_ms {
            config.run.jitter_ms = ms;
        }
        if let Some(n) = self.fail_every {
            config.run.fail_every = n;
        }
        if let Some(format) = &self.format {
            config.run.format = format.clone();
        }
    }
}

/// Arguments for config management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "./batch-dispatch.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment variables instead
        #[arg(long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the first one found)
        #[arg(short, long)]
        file: Option<String>,
    },

    /// List recognised environment variables
    Env,
}
