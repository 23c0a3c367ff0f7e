// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use stackup_core::domain::secret::SecretNames;
use stackup_core::domain::stack_config::StackConfigManifest;
use stackup_core::infrastructure::descriptor_template::DescriptorTemplateEngine;

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the fully resolved manifest as YAML
        #[arg(long)]
        raw: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./stackup.yaml)
        #[arg(short, long, default_value = "./stackup.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, raw } => show(config_override, paths, raw),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool, raw: bool) -> Result<()> {
    let config = StackConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. STACKUP_CONFIG_PATH: {}",
            std::env::var("STACKUP_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./stackup.yaml");
        println!("  4. ~/.stackup/config.yaml");
        println!("  5. /etc/stackup/config.yaml");
        println!();
    }

    if raw {
        print!(
            "{}",
            serde_yaml::to_string(&config).context("Failed to serialize configuration")?
        );
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Stack:".bold());
    println!("  Project: {}", spec.project);
    println!("  Region: {}", spec.region);
    println!("  Profile: {}", spec.profile);
    println!("  Control plane: {}", spec.control_plane.endpoint);
    println!();

    println!("{}", "Network tier:".bold());
    println!(
        "  Database: {} {} on port {} ({} GB)",
        spec.database.engine, spec.database.instance_class, spec.database.port, spec.database.storage_gb
    );
    println!(
        "  Cache: {} {} x{} on port {}",
        spec.cache.engine, spec.cache.node_type, spec.cache.node_count, spec.cache.port
    );
    println!(
        "  Log sink: {} ({} days)",
        config.log_sink_name(),
        spec.observability.retention_days
    );
    let names = SecretNames::for_project(&spec.project);
    println!(
        "  Secrets: {}, {}, {}",
        names.database_url, names.cache_url, names.signing_key
    );
    println!();

    println!("{}", "Service tier:".bold());
    println!(
        "  Listener port: {}, health check {}",
        spec.edge.listener_port, spec.edge.health_check.path
    );
    println!("  Image: {}", spec.workload.image);
    println!(
        "  Container: {} on port {} ({} CPU units, {} MB, {} task(s))",
        spec.workload.container_name,
        spec.workload.port,
        spec.workload.cpu_units,
        spec.workload.memory_mb,
        spec.workload.desired_count
    );
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = StackConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    validate_manifest(&config)?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

/// Structural checks plus a trial render of the workload template
pub fn validate_manifest(config: &StackConfigManifest) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;
    DescriptorTemplateEngine::new()
        .validate_workload(&config.spec.workload)
        .context("spec.workload template is invalid")?;
    Ok(())
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_templates_are_valid() {
        for template in [MINIMAL_TEMPLATE, EXAMPLES_TEMPLATE] {
            let manifest = StackConfigManifest::from_yaml_str(template).unwrap();
            validate_manifest(&manifest).unwrap();
        }
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        let mut manifest = StackConfigManifest::from_yaml_str(MINIMAL_TEMPLATE).unwrap();
        manifest.spec.workload.image = "registry/{{tenant}}:latest".to_string();
        assert!(validate_manifest(&manifest).is_err());
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("stackup.yaml");
        generate(output.clone(), true).unwrap();
        let written = std::fs::read_to_string(output).unwrap();
        assert_eq!(written, EXAMPLES_TEMPLATE);
    }
}
