//! Tailwind CLI integration for expanding utility classes

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::StyleError;
use crate::config::{Config, Mode};

/// Runs the Tailwind CLI over compiled CSS
#[derive(Debug, Clone)]
pub struct TailwindCli {
    /// Program followed by its leading arguments
    command: Vec<String>,

    /// Tailwind config file
    config: PathBuf,

    /// Working directory, so the config's content globs resolve
    cwd: PathBuf,

    mode: Mode,
}

impl TailwindCli {
    /// Build from the project config; `None` when no Tailwind config is set
    pub fn from_config(config: &Config, mode: Mode) -> Option<Self> {
        config.tailwind_config_path().map(|path| Self {
            command: config.styles.tailwind_command.clone(),
            config: path,
            cwd: config.root.clone(),
            mode,
        })
    }

    /// Expand Tailwind directives and utilities in `css`
    pub async fn expand(&self, css: &str) -> Result<String, StyleError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| StyleError::Tailwind("styles.tailwind_command is empty".to_string()))?;

        let mut input = tempfile::Builder::new()
            .prefix("sluice-")
            .suffix(".css")
            .tempfile()?;
        input.write_all(css.as_bytes())?;
        input.flush()?;

        debug!("Running {} with {}", program, self.config.display());

        let output = Command::new(program)
            .args(args)
            .arg("-c")
            .arg(&self.config)
            .arg("-i")
            .arg(input.path())
            .current_dir(&self.cwd)
            .env("NODE_ENV", self.mode.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| StyleError::Tailwind(format!("failed to run '{}': {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StyleError::Tailwind(format!(
                "'{}' exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| StyleError::Tailwind("output is not valid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(command: &[&str]) -> TailwindCli {
        let dir = std::env::temp_dir();
        TailwindCli {
            command: command.iter().map(|s| s.to_string()).collect(),
            config: dir.join("tailwind.config.js"),
            cwd: dir,
            mode: Mode::Development,
        }
    }

    #[test]
    fn test_disabled_without_config() {
        let config = Config::default_config(".");
        assert!(TailwindCli::from_config(&config, Mode::Production).is_none());
    }

    #[test]
    fn test_config_path_resolved_against_root() {
        let mut config = Config::default_config("/project");
        config.styles.tailwind_config = Some("tailwind.config.js".to_string());

        let cli = TailwindCli::from_config(&config, Mode::Production).unwrap();
        assert_eq!(cli.config, PathBuf::from("/project/tailwind.config.js"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_expand_reads_stdout() {
        // args after the script: -c <config> -i <input>
        let cli = cli(&["sh", "-c", "cat \"$4\"", "sh"]);

        let css = cli.expand(".a { color: red; }").await.unwrap();
        assert_eq!(css, ".a { color: red; }");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_expand_failure_is_style_error() {
        let cli = cli(&["sh", "-c", "echo broken config >&2; exit 3", "sh"]);

        let err = cli.expand("").await.unwrap_err();
        assert!(err.to_string().contains("broken config"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let cli = cli(&["sluice-no-such-tailwind-binary"]);

        let err = cli.expand("").await.unwrap_err();
        assert!(matches!(err, StyleError::Tailwind(_)));
    }

    #[tokio::test]
    async fn test_empty_command() {
        let cli = cli(&[]);
        assert!(cli.expand("").await.is_err());
    }
}
