//! Passthrough tasks: HTML pages, external scripts and images

pub mod images;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::BuildContext;
use crate::pipeline::{Task, TaskReport};
use crate::utils::{copy_relative, has_extension, parent_is, write_file, FileLister, FsLister};

pub use images::{ImageError, ImageOptimizer};

/// Files below `dir`, or none when the directory does not exist
fn list_optional(dir: &Path, lister: &dyn FileLister) -> Result<Vec<PathBuf>> {
    match lister.list(dir) {
        Ok(files) => Ok(files),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("{} does not exist, nothing to copy", dir.display());
            Ok(Vec::new())
        }
        Err(err) => Err(err).with_context(|| format!("Failed to list {}", dir.display())),
    }
}

/// Copy the files under `from` accepted by `filter` to the same place under `to`
fn copy_matching(
    task: Task,
    from: &Path,
    to: &Path,
    filter: impl Fn(&Path) -> bool,
) -> Result<TaskReport> {
    let mut report = TaskReport::new(task);

    for file in list_optional(from, &FsLister)? {
        if !filter(&file) {
            continue;
        }
        let target = copy_relative(&file, from, to)
            .with_context(|| format!("Failed to copy {}", file.display()))?;
        report.output(target);
    }

    debug!("Copied {} file(s) to {}", report.outputs.len(), to.display());
    Ok(report)
}

/// Copy every HTML page to the output root
pub async fn html(ctx: &BuildContext) -> Result<TaskReport> {
    let from = ctx.config.path(&ctx.config.paths.src.base);
    let to = ctx.config.path(&ctx.output().base);

    tokio::task::spawn_blocking(move || {
        copy_matching(Task::Html, &from, &to, |f| has_extension(f, &["html"]))
    })
    .await?
}

/// Copy scripts from `external` directories without bundling them
pub async fn external_scripts(ctx: &BuildContext) -> Result<TaskReport> {
    let from = ctx.config.path(&ctx.config.paths.src.js);
    let to = ctx.config.path(&ctx.output().js);

    tokio::task::spawn_blocking(move || {
        copy_matching(Task::ExternalScripts, &from, &to, |f| parent_is(f, "external"))
    })
    .await?
}

/// Copy images, optimizing them for production
pub async fn images(ctx: &BuildContext) -> Result<TaskReport> {
    let ctx = ctx.clone();
    tokio::task::spawn_blocking(move || images_blocking(&ctx)).await?
}

fn images_blocking(ctx: &BuildContext) -> Result<TaskReport> {
    let from = ctx.config.path(&ctx.config.paths.src.img);
    let to = ctx.config.path(&ctx.output().img);

    if !ctx.mode.is_production() {
        return copy_matching(Task::Images, &from, &to, |_| true);
    }

    let optimizer = ImageOptimizer::from_config(&ctx.config);
    let mut report = TaskReport::new(Task::Images);

    for file in list_optional(&from, &FsLister)? {
        if !ImageOptimizer::supports(&file) {
            let target = copy_relative(&file, &from, &to)
                .with_context(|| format!("Failed to copy {}", file.display()))?;
            report.output(target);
            continue;
        }

        let target = to.join(file.strip_prefix(&from)?);
        match optimizer.optimize(&file) {
            Ok(bytes) => write_file(&target, bytes)
                .with_context(|| format!("Failed to write {}", target.display()))?,
            Err(ImageError::Io(err)) => {
                return Err(err).with_context(|| format!("Failed to optimize {}", file.display()))
            }
            Err(err) => {
                warn!("Copying {} unoptimized: {}", file.display(), err);
                copy_relative(&file, &from, &to)
                    .with_context(|| format!("Failed to copy {}", file.display()))?;
            }
        }
        report.output(target);
    }

    Ok(report)
}
