//! Development command implementation

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tokio::sync::mpsc;
use tracing::info;

use super::load_config;
use crate::config::{BuildContext, Config, Mode};
use crate::pipeline::Pipeline;
use crate::server::{self, DevServer, ServeOptions};
use crate::utils::{format_duration, relative_path};
use crate::watch::{self, WatchRules};

/// Build into the development tree, then serve and watch it
#[derive(Args, Debug, Default)]
pub struct DevCommand {
    /// Port to run the preview server on
    #[arg(short, long, env = "SLUICE_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

impl DevCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let config = load_config(config_path)?;
        let pipeline = Pipeline::new(BuildContext::new(config.clone(), Mode::Development));

        let start = std::time::Instant::now();
        let reports = pipeline.build().await?;
        let errors: usize = reports.iter().map(|r| r.errors.len()).sum();

        eprintln!(
            "{} Development build finished in {}{}",
            "✓".green().bold(),
            format_duration(start.elapsed()),
            if errors > 0 {
                format!(" with {} error(s)", errors).red().to_string()
            } else {
                String::new()
            }
        );

        let reload_tx = server::channel();
        let rules = WatchRules::new(&config)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let _watcher = watch::watch(&watch::watch_targets(&config), tx)?;

        eprintln!("\n\t{} Watching for Changes..\n", "👀".yellow());

        let server = DevServer::new(
            config.path(&config.paths.dist.base),
            self.serve_options(&config),
            reload_tx.clone(),
        );
        let stylesheet = stylesheet_url(&config);

        tokio::select! {
            result = server.start() => result,
            _ = watch::run_worker(&pipeline, &rules, rx, &reload_tx, &stylesheet) => Ok(()),
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping");
                Ok(())
            }
        }
    }

    /// Server settings with command-line overrides applied
    fn serve_options(&self, config: &Config) -> ServeOptions {
        let mut options = ServeOptions::from(&config.server);
        if let Some(port) = self.port {
            options.port = port;
        }
        if let Some(host) = &self.host {
            options.host = host.clone();
        }
        options.open |= self.open;
        options
    }
}

/// URL path of the main stylesheet, relative to the served root
fn stylesheet_url(config: &Config) -> String {
    let dist = &config.paths.dist;
    let css_dir = relative_path(&config.path(&dist.base), &config.path(&dist.css)).unwrap_or_default();

    if css_dir.is_empty() {
        config.styles.output.clone()
    } else {
        format!("{}/{}", css_dir, config.styles.output)
    }
}
