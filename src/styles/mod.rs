//! Stylesheet tasks
//!
//! The main stylesheet goes through Sass, Tailwind, vendor prefixing and,
//! for production builds, purging and minification before being written as
//! a single file. Page stylesheets only get Sass and vendor prefixing and are
//! written one by one.

pub mod purge;
pub mod tailwind;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::BuildContext;
use crate::pipeline::{Task, TaskReport};
use crate::utils::{has_extension, parent_is, write_file, FileLister, FsLister};

pub use purge::ContentTokens;
pub use tailwind::TailwindCli;

/// Errors that can occur when compiling stylesheets.
#[derive(Debug, Error)]
pub enum StyleError {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A Sass compilation error occurred.
    #[error("Sass compilation error: {0}")]
    Sass(String),

    /// The Tailwind CLI failed.
    #[error("Tailwind error: {0}")]
    Tailwind(String),

    /// CSS could not be parsed, transformed or printed.
    #[error("CSS error: {0}")]
    Css(String),

    /// The browserslist queries are invalid.
    #[error("Invalid browserslist: {0}")]
    Targets(String),
}

/// Post-processing applied after Sass (and Tailwind)
#[derive(Debug, Clone, Default)]
pub struct PostProcess {
    pub targets: Targets,
    pub purge: Option<ContentTokens>,
    pub minify: bool,
}

/// Resolve browserslist queries into lightningcss targets
pub fn browser_targets(queries: &[String]) -> Result<Targets, StyleError> {
    if queries.is_empty() {
        return Ok(Targets::default());
    }

    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| StyleError::Targets(e.to_string()))?;

    Ok(browsers.map(Targets::from).unwrap_or_default())
}

/// Compile a Sass file to CSS
pub fn compile_sass(path: &Path, load_path: &Path) -> Result<String, StyleError> {
    let options = grass::Options::default()
        .style(grass::OutputStyle::Expanded)
        .load_path(load_path);

    grass::from_path(path, &options).map_err(|e| StyleError::Sass(e.to_string()))
}

/// Vendor-prefix, optionally purge, and print CSS
pub fn postprocess(css: &str, filename: &str, options: &PostProcess) -> Result<String, StyleError> {
    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| StyleError::Css(e.to_string()))?;

    // lightningcss adds vendor prefixes in its transform pass, so this runs
    // in every mode; whitespace minification is decided by the printer below.
    stylesheet
        .minify(MinifyOptions {
            targets: options.targets.clone(),
            ..MinifyOptions::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;

    if let Some(tokens) = &options.purge {
        let removed = purge::purge_stylesheet(&mut stylesheet, tokens);
        debug!("Purged {} unused selectors from {}", removed, filename);
    }

    let output = stylesheet
        .to_css(PrinterOptions {
            minify: options.minify,
            targets: options.targets.clone(),
            ..PrinterOptions::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;

    Ok(output.code)
}

/// Compile the main stylesheet into the single output stylesheet
pub async fn main_style(ctx: &BuildContext) -> Result<TaskReport> {
    let mut report = TaskReport::new(Task::MainStyle);
    let config = ctx.config.clone();

    let css_dir = ctx.config.path(&ctx.config.paths.src.css);
    let source = css_dir.join(&config.styles.main);
    if !source.is_file() {
        anyhow::bail!("Main stylesheet not found: {}", source.display());
    }

    let compiled = {
        let (source, css_dir) = (source.clone(), css_dir.clone());
        tokio::task::spawn_blocking(move || compile_sass(&source, &css_dir)).await?
    };
    let compiled = match compiled {
        Ok(css) => css,
        Err(err) => {
            report.fail(format!("{}: {}", source.display(), err));
            return Ok(report);
        }
    };

    if !ctx.mode.is_production() {
        let sibling = source.with_extension("css");
        write_file(&sibling, &compiled)
            .with_context(|| format!("Failed to write {}", sibling.display()))?;
    }

    let expanded = match TailwindCli::from_config(&config, ctx.mode) {
        Some(tailwind) => match tailwind.expand(&compiled).await {
            Ok(css) => css,
            Err(err) => {
                report.fail(format!("{}: {}", source.display(), err));
                return Ok(report);
            }
        },
        None => {
            info!("styles.tailwind_config is not set, skipping Tailwind");
            compiled
        }
    };

    let mut options = PostProcess {
        targets: browser_targets(&config.styles.browserslist)?,
        purge: None,
        minify: ctx.mode.is_production(),
    };

    if ctx.mode.is_production() {
        let content_root = ctx.config.path(&ctx.config.paths.src.base);
        let mut tokens = ContentTokens::scan(&content_root, &FsLister)
            .with_context(|| format!("Failed to scan {} for used selectors", content_root.display()))?;
        tokens.add_safelist(&config.styles.safelist);
        options.purge = Some(tokens);
    }

    let filename = source.display().to_string();
    let processed =
        tokio::task::spawn_blocking(move || postprocess(&expanded, &filename, &options)).await?;
    let css = match processed {
        Ok(css) => css,
        Err(err) => {
            report.fail(format!("{}: {}", source.display(), err));
            return Ok(report);
        }
    };

    let target = ctx.config.path(&ctx.output().css).join(&config.styles.output);
    write_file(&target, &css).with_context(|| format!("Failed to write {}", target.display()))?;
    info!("Compiled {}", target.display());
    report.output(target);

    Ok(report)
}

/// Compile every stylesheet inside a `pages` directory
pub async fn page_styles(ctx: &BuildContext) -> Result<TaskReport> {
    let ctx = ctx.clone();
    tokio::task::spawn_blocking(move || page_styles_blocking(&ctx)).await?
}

fn page_styles_blocking(ctx: &BuildContext) -> Result<TaskReport> {
    let mut report = TaskReport::new(Task::PageStyles);
    let css_dir = ctx.config.path(&ctx.config.paths.src.css);
    let out_dir = ctx.config.path(&ctx.output().css);

    let options = PostProcess {
        targets: browser_targets(&ctx.config.styles.browserslist)?,
        ..PostProcess::default()
    };

    for source in page_style_sources(&css_dir, &FsLister)? {
        let compiled = match compile_sass(&source, &css_dir) {
            Ok(css) => css,
            Err(err) => {
                report.fail(format!("{}: {}", source.display(), err));
                continue;
            }
        };

        if !ctx.mode.is_production() {
            let sibling = source.with_extension("css");
            write_file(&sibling, &compiled)
                .with_context(|| format!("Failed to write {}", sibling.display()))?;
        }

        let css = match postprocess(&compiled, &source.display().to_string(), &options) {
            Ok(css) => css,
            Err(err) => {
                report.fail(format!("{}: {}", source.display(), err));
                continue;
            }
        };

        let relative = source
            .strip_prefix(&css_dir)
            .with_context(|| format!("{} is outside {}", source.display(), css_dir.display()))?;
        let target = out_dir.join(relative).with_extension("css");
        write_file(&target, &css).with_context(|| format!("Failed to write {}", target.display()))?;
        debug!("Compiled {}", target.display());
        report.output(target);
    }

    Ok(report)
}

/// Sass sources inside `pages` directories, skipping partials
pub fn page_style_sources(css_dir: &Path, lister: &dyn FileLister) -> Result<Vec<PathBuf>> {
    let files = lister
        .list(css_dir)
        .with_context(|| format!("Failed to list {}", css_dir.display()))?;

    Ok(files
        .into_iter()
        .filter(|f| parent_is(f, "pages") && has_extension(f, &["scss"]))
        .filter(|f| {
            f.file_name()
                .and_then(|n| n.to_str())
                .map(|n| !n.starts_with('_'))
                .unwrap_or(false)
        })
        .collect())
}
