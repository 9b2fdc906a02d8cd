//! Config command - view and validate shelfmirror configuration
//!
//! Provides the `shelfmirror config` CLI command which:
//! 1. Shows the effective configuration as YAML
//! 2. Prints the path the configuration is loaded from
//! 3. Validates the configuration file and reports field errors

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use shelfmirror_core::config::Config;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, config_path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                let config = Config::load_or_default(config_path);
                let yaml = serde_yaml::to_string(&config)
                    .context("cannot serialize configuration to YAML")?;
                println!("# {}", config_path.display());
                print!("{yaml}");
                Ok(())
            }
            ConfigCommand::Path => {
                println!("{}", config_path.display());
                Ok(())
            }
            ConfigCommand::Validate => {
                let config = Config::load(config_path)
                    .with_context(|| format!("cannot load '{}'", config_path.display()))?;
                let errors = config.validate();
                if errors.is_empty() {
                    println!("{}: OK", config_path.display());
                    Ok(())
                } else {
                    for error in &errors {
                        eprintln!("{error}");
                    }
                    anyhow::bail!("{} validation error(s)", errors.len())
                }
            }
        }
    }
}
