//! Configuration handling for Sluice
//!
//! Parses and manages sluice.toml configuration files.

mod schema;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use schema::*;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source and output directory layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Development server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Stylesheet pipeline settings
    #[serde(default)]
    pub styles: StylesConfig,

    /// Script bundling settings
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// Image optimization settings
    #[serde(default)]
    pub images: ImagesConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", canonical_path.display()))?;

        // Set root directory to the directory containing the config file
        config.root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text without touching the filesystem
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Create a default configuration rooted at `root`
    pub fn default_config(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: PathsConfig::default(),
            server: ServerConfig::default(),
            styles: StylesConfig::default(),
            scripts: ScriptsConfig::default(),
            images: ImagesConfig::default(),
            root: root.into(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let paths = &self.paths;

        if paths.dist.base == paths.build.base {
            anyhow::bail!(
                "paths.dist.base and paths.build.base must be different directories (both are '{}')",
                paths.dist.base
            );
        }

        for (name, output) in [("dist", &paths.dist), ("build", &paths.build)] {
            if output.base == paths.src.base {
                anyhow::bail!(
                    "paths.{}.base must not be the source directory '{}'",
                    name,
                    paths.src.base
                );
            }
        }

        if !(1..=100).contains(&self.images.jpeg_quality) {
            anyhow::bail!(
                "images.jpeg_quality must be between 1 and 100, got {}",
                self.images.jpeg_quality
            );
        }

        Ok(())
    }

    /// Resolve a configured relative path against the project root
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Output tree selected by the build mode
    pub fn output(&self, mode: Mode) -> &OutputPaths {
        match mode {
            Mode::Development => &self.paths.dist,
            Mode::Production => &self.paths.build,
        }
    }

    /// Absolute path to the Tailwind config file, if one is configured
    pub fn tailwind_config_path(&self) -> Option<PathBuf> {
        self.styles.tailwind_config.as_deref().map(|p| self.path(p))
    }
}

/// Build mode, chosen once per invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn is_production(self) -> bool {
        matches!(self, Mode::Production)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Development => f.write_str("development"),
            Mode::Production => f.write_str("production"),
        }
    }
}

/// Immutable per-invocation build settings handed to every task
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub config: Arc<Config>,
    pub mode: Mode,
}

impl BuildContext {
    pub fn new(config: Arc<Config>, mode: Mode) -> Self {
        Self { config, mode }
    }

    /// Output tree for this build
    pub fn output(&self) -> &OutputPaths {
        self.config.output(self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.paths.src.css, "src/css");
        assert_eq!(config.paths.dist, OutputPaths::under("dist"));
        assert_eq!(config.paths.build.img, "build/img");
        assert_eq!(config.server.port, 5000);
        assert!(config.styles.tailwind_config.is_none());
        assert_eq!(config.scripts.shared_chunk, "main");
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
[paths.src]
base = "app"

[paths.dist]
base = "preview"
css = "preview/styles"
js = "preview/scripts"
img = "preview/images"

[paths.build]
base = "release"

[server]
port = 9050

[styles]
tailwind_config = "tailwind.config.js"
"#,
        )
        .unwrap();

        assert_eq!(config.paths.src.base, "app");
        assert_eq!(config.paths.src.js, "src/js");
        assert_eq!(config.paths.dist.css, "preview/styles");
        assert_eq!(config.paths.build, OutputPaths::under("release"));
        assert_eq!(config.server.port, 9050);
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.styles.tailwind_config.as_deref(), Some("tailwind.config.js"));
    }

    #[test]
    fn test_output_selected_by_mode() {
        let config = Config::default_config("/project");

        assert_eq!(config.output(Mode::Development).base, "dist");
        assert_eq!(config.output(Mode::Production).base, "build");

        let ctx = BuildContext::new(Arc::new(config), Mode::Production);
        assert_eq!(ctx.config.path(&ctx.output().js), PathBuf::from("/project/build/js"));
    }

    #[test]
    fn test_shared_output_tree_rejected() {
        let mut config = Config::default_config(".");
        config.paths.build = OutputPaths::under("dist");

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be different"));
    }

    #[test]
    fn test_output_over_source_rejected() {
        let mut config = Config::default_config(".");
        config.paths.dist = OutputPaths::under("src");

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("sluice.toml")).unwrap_err();

        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_sets_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sluice.toml");
        fs::write(&path, "[server]\nport = 8080\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.root, dir.path());
        assert_eq!(config.server.port, 8080);
    }
}
