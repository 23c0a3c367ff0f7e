// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # stackup
//!
//! Operator CLI for the two provisioning phases.
//!
//! ## Commands
//!
//! - `stackup provision-network-tier` - boundaries, database, cache, secrets, log sink
//! - `stackup provision-service-tier` - load balancer, listener, workload service
//! - `stackup config show|validate|generate` - Configuration management
//!
//! Both phases are safe to repeat. The exit code reports the phase outcome:
//! `0` complete, `2` aborted, `3` waiting on pending resources, `4` completed
//! with failures.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stackup::commands::{self, ConfigCommand, ProvisionArgs};
use stackup::output::OutputFormat;
use stackup_core::domain::report::Phase;

/// Idempotent discover-or-create provisioning
#[derive(Parser)]
#[command(name = "stackup")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "STACKUP_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Credential profile (overrides the configured profile)
    #[arg(long, global = true, env = "STACKUP_PROFILE")]
    profile: Option<String>,

    /// Run against a local JSON-backed control plane instead of the API
    #[arg(long, global = true, value_name = "FILE")]
    sandbox: Option<PathBuf>,

    /// Report format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    output: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "STACKUP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision security boundaries, managed database and cache, secrets and log sink
    #[command(name = "provision-network-tier")]
    ProvisionNetworkTier,

    /// Provision the edge load balancer and the workload service behind it
    #[command(name = "provision-service-tier")]
    ProvisionServiceTier,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let args = ProvisionArgs {
        config: cli.config.clone(),
        profile: cli.profile.clone(),
        sandbox: cli.sandbox.clone(),
        output: cli.output,
    };

    match cli.command {
        Commands::ProvisionNetworkTier => {
            let code = commands::provision::run(Phase::NetworkTier, &args).await?;
            std::process::exit(code);
        }
        Commands::ProvisionServiceTier => {
            let code = commands::provision::run(Phase::ServiceTier, &args).await?;
            std::process::exit(code);
        }
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
