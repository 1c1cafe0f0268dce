//! Clean command implementation

use anyhow::Result;
use clap::Args;

use super::load_config;
use crate::config::{BuildContext, Mode};
use crate::pipeline;

/// Remove the development or production output tree
#[derive(Args, Debug, Default)]
pub struct CleanCommand {
    /// Remove the production tree instead of the development one
    #[arg(short, long)]
    pub production: bool,
}

impl CleanCommand {
    pub fn mode(&self) -> Mode {
        if self.production {
            Mode::Production
        } else {
            Mode::Development
        }
    }

    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let config = load_config(config_path)?;
        pipeline::clean(&BuildContext::new(config, self.mode()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode() {
        assert_eq!(CleanCommand::default().mode(), Mode::Development);
        assert_eq!(CleanCommand { production: true }.mode(), Mode::Production);
    }
}
