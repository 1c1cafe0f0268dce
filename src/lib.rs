//! Sluice library
//!
//! Core functionality for the Sluice asset pipeline.

pub mod assets;
pub mod bundler;
pub mod cli;
pub mod config;
pub mod entries;
pub mod pipeline;
pub mod resolver;
pub mod server;
pub mod styles;
pub mod transform;
pub mod utils;
pub mod watch;

pub use cli::Cli;
pub use config::Config;
pub use pipeline::Pipeline;
