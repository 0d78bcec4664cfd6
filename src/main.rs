//! batch-dispatch - concurrent batch dispatcher CLI
//!
//! Dispatches a simulated batch of independent items over a bounded number of
//! lanes and reports every outcome together with the batch's took time.
//!
//! ## Usage
//!
//! ```bash
//! # Dispatch 100 items, at most 8 at a time
//! batch-dispatch run --items 100 --concurrent 8
//!
//! # Deterministic took time
//! batch-dispatch run --items 1 --clock controlled --controlled-took-ms 1
//!
//! # JSON output and a saved run report
//! batch-dispatch run --format json-pretty --output report.json
//!
//! # Configuration
//! batch-dispatch config init
//! batch-dispatch config show --env
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, warn};

use batch_dispatch::config::{env::print_env_help, ConfigFile, ConfigFormat, EnvConfig};
use batch_dispatch::dispatch::{Dispatcher, ManualClock, SystemClock};
use batch_dispatch::output::{OutputFormat, ResultFormatter, RunReport};
use batch_dispatch::simulate::SimulatedExecutor;
use batch_dispatch::utils::logger::init_logger;

mod cli;

use cli::{Args, ClockKind};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env = EnvConfig::load();
    let config_path = args.config.clone().or_else(|| env.config_file.clone());
    let mut config = match &config_path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };
    env.apply_to(&mut config);

    let level = args.log_level(&config.dispatch);
    init_logger(level)?;
    if config.dispatch.log_level().is_none() {
        warn!(
            "Unknown log level '{}', using {}",
            config.dispatch.log_level, level
        );
    }

    match args.command {
        cli::Command::Run(run_args) => {
            run_batch(run_args, config).await?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &config, &env)?;
        }
    }

    Ok(())
}

async fn run_batch(args: cli::RunArgs, mut config: ConfigFile) -> Result<()> {
    args.apply_to(&mut config);
    config.validate()?;

    let format = OutputFormat::from_str(&config.run.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", config.run.format))?;
    let items = config.run.items;
    let concurrency = config.dispatch.effective_concurrency().min(items);

    let dispatcher: Dispatcher<usize, _> = Dispatcher::new(
        Handle::current(),
        SimulatedExecutor::from_config(&config.run),
    )
    .with_config(&config.dispatch);

    let dispatcher = match args.clock {
        ClockKind::Real => dispatcher.with_clock(SystemClock::new()),
        ClockKind::Controlled => {
            let clock = Arc::new(ManualClock::new());
            let hook_clock = clock.clone();
            let took = Duration::from_millis(args.controlled_took_ms);
            dispatcher
                .with_shared_clock(clock)
                .on_dequeue(move |_, _| hook_clock.set_nanos(took.as_nanos() as u64))
        }
    };

    info!(
        "Dispatching {} simulated items ({} lanes, {} clock)",
        items,
        concurrency,
        args.clock.name()
    );

    let started_at = Utc::now();
    let response = dispatcher
        .dispatch((0..items).collect::<Vec<_>>())
        .await
        .context("Batch dispatch failed")?;

    let mut formatter = ResultFormatter::new(format);
    if args.no_color {
        formatter = formatter.no_color();
    }
    println!("{}", formatter.format_response(&response)?);

    if let Some(output) = args.output {
        let report =
            RunReport::from_response(&response, started_at, concurrency, args.clock.name());
        report.save(&output)?;
        println!(
            "Report {} saved to {} ({:.1}% succeeded)",
            report.id,
            output,
            report.success_rate()
        );
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, config: &ConfigFile, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
        }

        cli::ConfigAction::Show { env: show_env, format } => {
            if show_env {
                env.print_summary();
            } else {
                let format = ConfigFormat::from_str(&format)
                    .ok_or_else(|| anyhow::anyhow!("Unknown config format: {format}"))?;
                println!("{}", format.render(config)?);
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(|| ConfigFile::find().map(|p| p.to_string_lossy().to_string()))
                .unwrap_or_else(|| "./batch-dispatch.yaml".to_string());

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {path}");
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {path}");
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => {
            print_env_help();
        }
    }

    Ok(())
}
