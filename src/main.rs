//! Sluice - a front-end asset pipeline
//!
//! Compiles a `src/` tree of HTML, SCSS, JavaScript and images into a
//! development preview tree or a production release tree.
//!
//! # Features
//! - Sass compilation, Tailwind, vendor prefixing, purge and minify
//! - ES module bundling with page entries and a shared chunk
//! - Image optimization for production builds
//! - Preview server with live reload driven by a file watcher

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sluice_lib::Cli;

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sluice=debug,tower_http=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sluice=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    cli.execute().await
}
