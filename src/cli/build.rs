//! Build command implementation

use std::fs;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::load_config;
use crate::config::{BuildContext, Mode};
use crate::pipeline::{Pipeline, TaskReport};
use crate::utils::{format_duration, format_size, relative_path};

/// Build the project for production
#[derive(Args, Debug, Default)]
pub struct BuildCommand {}

impl BuildCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let start = Instant::now();

        let config = load_config(config_path)?;
        let pipeline = Pipeline::new(BuildContext::new(config.clone(), Mode::Production));

        let spinner = spinner("Building for production...");
        let result = pipeline.build().await;
        spinner.finish_and_clear();
        let reports = result?;

        let duration = start.elapsed();
        let outputs: usize = reports.iter().map(|r| r.outputs.len()).sum();
        let errors: usize = reports.iter().map(|r| r.errors.len()).sum();

        eprintln!(
            "\n{} Built {} file(s) in {}\n",
            "✓".green().bold(),
            outputs,
            format_duration(duration)
        );

        for report in &reports {
            print_report(report, &config.root);
        }

        if errors > 0 {
            eprintln!(
                "\n{} {} task error(s), see above\n",
                "✗".red().bold(),
                errors
            );
        }

        eprintln!(
            "\n\t{} Production build is complete. Files are located at {}\n",
            "✓".green(),
            config.paths.build.base.cyan()
        );

        Ok(())
    }
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Print the files and errors of one task
fn print_report(report: &TaskReport, root: &std::path::Path) {
    for output in &report.outputs {
        let size = fs::metadata(output).map(|m| m.len() as usize).unwrap_or(0);
        let name = relative_path(root, output).unwrap_or_else(|| output.display().to_string());

        eprintln!(
            "  {} {} {}",
            "•".dimmed(),
            name.cyan(),
            format_size(size).dimmed()
        );
    }

    for error in &report.errors {
        eprintln!("  {} [{}] {}", "✗".red(), report.task, error);
    }
}
