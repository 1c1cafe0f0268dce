//! Command-line interface for Sluice
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `dev`: development build, preview server and watch loop (the default)
//! - `build`: production build
//! - `clean`: remove an output tree
//! - `init`: project scaffolding
//! - `test`: reserved, no test task is defined

mod build;
mod clean;
mod dev;
mod init;

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use crate::config::Config;

pub use build::BuildCommand;
pub use clean::CleanCommand;
pub use dev::DevCommand;
pub use init::InitCommand;

/// Sluice - a front-end asset pipeline with Sass, Tailwind, bundling and live reload
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Defaults to `dev` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Dev server options used when no command is given
    #[command(flatten)]
    pub dev: DevCommand,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to sluice.toml config file
    #[arg(short, long, global = true, default_value = "sluice.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build into the development tree, then serve and watch it
    Dev(DevCommand),

    /// Build the project for production
    #[command(alias = "prod")]
    Build(BuildCommand),

    /// Remove the development or production output tree
    Clean(CleanCommand),

    /// Initialize a new project
    Init(InitCommand),

    /// Run the project's tests
    Test(TestCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            None => self.dev.execute(&self.config).await,
            Some(Commands::Dev(cmd)) => cmd.execute(&self.config).await,
            Some(Commands::Build(cmd)) => cmd.execute(&self.config).await,
            Some(Commands::Clean(cmd)) => cmd.execute(&self.config).await,
            Some(Commands::Init(cmd)) => cmd.execute().await,
            Some(Commands::Test(cmd)) => cmd.execute(),
        }
    }
}

/// Run the project's tests
#[derive(Args, Debug)]
pub struct TestCommand {}

impl TestCommand {
    pub fn execute(&self) -> Result<()> {
        anyhow::bail!("no test task is defined for this project")
    }
}

/// Load the config file shared by every build command
fn load_config(config_path: &str) -> Result<Arc<Config>> {
    info!("Loading configuration from {}", config_path);
    Ok(Arc::new(Config::load(config_path)?))
}

/// Print the Sluice banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "≋".cyan(),
        "Sluice".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_command_means_dev() {
        let cli = Cli::parse_from(["sluice"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, "sluice.toml");
    }

    #[test]
    fn test_default_command_takes_dev_overrides() {
        let cli = Cli::parse_from(["sluice", "--port", "8082", "--host", "0.0.0.0"]);

        assert!(cli.command.is_none());
        assert_eq!(cli.dev.port, Some(8082));
        assert_eq!(cli.dev.host.as_deref(), Some("0.0.0.0"));
    }

    #[test]
    fn test_default_command_reads_port_env() {
        std::env::set_var("SLUICE_PORT", "8123");
        let cli = Cli::try_parse_from(["sluice"]);
        std::env::remove_var("SLUICE_PORT");

        assert_eq!(cli.unwrap().dev.port, Some(8123));
    }

    #[test]
    fn test_global_config_before_command() {
        let cli = Cli::parse_from(["sluice", "--config", "site/sluice.toml", "build"]);

        assert!(matches!(cli.command, Some(Commands::Build(_))));
        assert_eq!(cli.config, "site/sluice.toml");
    }

    #[test]
    fn test_prod_alias() {
        let cli = Cli::parse_from(["sluice", "prod", "--config", "site/sluice.toml"]);

        assert!(matches!(cli.command, Some(Commands::Build(_))));
        assert_eq!(cli.config, "site/sluice.toml");
    }

    #[test]
    fn test_dev_overrides() {
        let cli = Cli::parse_from(["sluice", "dev", "--port", "8081", "--open"]);

        let Some(Commands::Dev(dev)) = cli.command else {
            panic!("expected dev command");
        };
        assert_eq!(dev.port, Some(8081));
        assert!(dev.open);
        assert!(dev.host.is_none());
    }

    #[test]
    fn test_test_command_fails() {
        let err = TestCommand {}.execute().unwrap_err();
        assert!(err.to_string().contains("no test task"));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
