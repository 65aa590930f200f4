// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Nanohub simulator CLI
//!
//! Runs an event loop with demo nanoapps while producer threads flood it
//! with events, then prints the loop's debug dump.
//!
//! # Usage
//!
//! ```bash
//! # Default pool, 4 producers
//! nanohub-sim
//!
//! # Tiny pool to watch backpressure kick in
//! nanohub-sim gen-config --output tiny.toml   # then edit event_blocks = 1
//! nanohub-sim --config tiny.toml run --producers 8 --events 2000
//!
//! # Check a configuration file
//! nanohub-sim validate --config tiny.toml
//! ```

mod apps;
mod sim;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nanohub::EventLoopConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::sim::SimOptions;

/// Nanohub event loop simulator
#[derive(Parser, Debug)]
#[command(name = "nanohub-sim")]
#[command(about = "Nanohub simulator - runs an event loop with demo nanoapps and producer threads")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the simulation (default)
    Run {
        /// Number of producer threads
        #[arg(short, long, default_value = "4")]
        producers: usize,

        /// Events posted by each producer
        #[arg(short, long, default_value = "500")]
        events: u32,

        /// Post a ping every N events (0 to disable)
        #[arg(long, default_value = "10")]
        ping_every: u32,
    },

    /// Generate a default configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "nanohub.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Some(Commands::GenConfig { output }) => cmd_gen_config(output),
        Some(Commands::Validate) => cmd_validate(args.config),
        Some(Commands::Run {
            producers,
            events,
            ping_every,
        }) => cmd_run(
            args.config,
            &SimOptions {
                producers,
                events_per_producer: events,
                ping_every,
            },
        ),
        None => cmd_run(args.config, &SimOptions::default()),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<EventLoopConfig> {
    match path {
        Some(path) => EventLoopConfig::from_file(&path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => Ok(EventLoopConfig::default()),
    }
}

fn cmd_run(config_path: Option<PathBuf>, options: &SimOptions) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    println!("Nanohub Simulator v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!(
        "Event pool: {} x {} = {} events",
        config.event_blocks,
        config.events_per_block,
        config.event_capacity()
    );
    println!(
        "Producers: {} x {} events",
        options.producers, options.events_per_producer
    );
    println!();

    let report = sim::run(config, options)?;

    println!("Results:");
    println!("  Events posted:          {}", report.ticks_posted);
    println!("  Events rejected:        {}", report.ticks_rejected);
    println!("  Low priority dropped:   {}", report.dropped_low_priority);
    println!("  Readings received:      {}", report.readings_received);
    println!("  Pongs received:         {}", report.pongs_received);
    println!("  Max pending at dispatch: {}", report.max_pending);
    print!("{}", report.dump);
    Ok(())
}

fn cmd_gen_config(output: PathBuf) -> anyhow::Result<()> {
    let toml = EventLoopConfig::default().to_toml_string()?;
    std::fs::write(&output, toml)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Generated configuration: {}", output.display());
    Ok(())
}

fn cmd_validate(config: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config.context("validate needs --config <FILE>")?;
    let config = EventLoopConfig::from_file(&path)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    println!("Configuration is valid: {}", path.display());
    println!("  Event capacity: {}", config.event_capacity());
    println!("  Eviction target: {}", config.low_priority_evict_target);
    println!(
        "  Wakeup buckets: {} x {}s",
        config.wakeup_bucket_count, config.wakeup_bucket_interval_secs
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_config_then_validate() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nanohub.toml");
        cmd_gen_config(path.clone()).expect("gen-config");
        cmd_validate(Some(path.clone())).expect("validate");
        assert_eq!(load_config(Some(path)).expect("load"), EventLoopConfig::default());
    }

    #[test]
    fn test_validate_requires_path() {
        assert!(cmd_validate(None).is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["nanohub-sim", "run", "--producers", "2", "--events", "10"]);
        assert!(matches!(
            args.command,
            Some(Commands::Run {
                producers: 2,
                events: 10,
                ping_every: 10
            })
        ));
    }
}
