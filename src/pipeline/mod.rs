//! Build orchestration
//!
//! A build is a static sequence of stages. Each stage is either a single
//! task or a set of tasks run concurrently; a stage finishes only when every
//! task in it has finished, and a failing task never cancels its siblings.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use futures_util::future::join_all;
use tracing::{debug, error};

use crate::assets;
use crate::bundler;
use crate::config::BuildContext;
use crate::styles;

/// A unit of build work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {
    Clean,
    Html,
    MainStyle,
    PageStyles,
    Scripts,
    ExternalScripts,
    Images,
}

impl Task {
    pub fn name(self) -> &'static str {
        match self {
            Task::Clean => "clean",
            Task::Html => "html",
            Task::MainStyle => "main-style",
            Task::PageStyles => "page-styles",
            Task::Scripts => "scripts",
            Task::ExternalScripts => "external-scripts",
            Task::Images => "images",
        }
    }

    /// Whether the task only produces stylesheets
    pub fn is_style(self) -> bool {
        matches!(self, Task::MainStyle | Task::PageStyles)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of the task graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Single(Task),
    Parallel(&'static [Task]),
}

impl Stage {
    pub fn tasks(&self) -> &[Task] {
        match self {
            Stage::Single(task) => std::slice::from_ref(task),
            Stage::Parallel(tasks) => tasks,
        }
    }
}

/// Tasks of the parallel build stage
pub const BUILD_TASKS: &[Task] = &[
    Task::MainStyle,
    Task::PageStyles,
    Task::Scripts,
    Task::ExternalScripts,
    Task::Images,
    Task::Html,
];

/// Clean, then everything else at once
pub const BUILD_STAGES: &[Stage] = &[Stage::Single(Task::Clean), Stage::Parallel(BUILD_TASKS)];

/// What a task did
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: Task,

    /// Files written
    pub outputs: Vec<PathBuf>,

    /// Non-fatal failures (compile and bundle errors)
    pub errors: Vec<String>,

    pub elapsed: Duration,
}

impl TaskReport {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            outputs: Vec::new(),
            errors: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn output(&mut self, path: PathBuf) {
        self.outputs.push(path);
    }

    /// Record and log a non-fatal failure
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("[{}] {}", self.task, message);
        self.errors.push(message);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Something that can run build tasks
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: Task) -> Result<TaskReport>;
}

/// Run stages in order, joining each parallel stage before the next
///
/// Errors from tasks in a stage are collected once all of them have
/// finished; the first one is returned and later stages do not run.
pub async fn run_stages<E>(executor: &E, stages: &[Stage]) -> Result<Vec<TaskReport>>
where
    E: TaskExecutor + ?Sized,
{
    let mut reports = Vec::new();

    for stage in stages {
        let results = join_all(stage.tasks().iter().map(|&task| executor.execute(task))).await;

        let mut first_error = None;
        for result in results {
            match result {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!("{:#}", err);
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
    }

    Ok(reports)
}

/// Run a series of tasks one after another
pub async fn run_series<E>(executor: &E, tasks: &[Task]) -> Result<Vec<TaskReport>>
where
    E: TaskExecutor + ?Sized,
{
    let mut reports = Vec::with_capacity(tasks.len());
    for &task in tasks {
        reports.push(executor.execute(task).await?);
    }
    Ok(reports)
}

/// Runs tasks against the real filesystem
#[derive(Debug, Clone)]
pub struct Pipeline {
    ctx: BuildContext,
}

impl Pipeline {
    pub fn new(ctx: BuildContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    /// Clean the output tree and run every build task
    pub async fn build(&self) -> Result<Vec<TaskReport>> {
        run_stages(self, BUILD_STAGES).await
    }

    async fn dispatch(&self, task: Task) -> Result<TaskReport> {
        match task {
            Task::Clean => clean(&self.ctx),
            Task::Html => assets::html(&self.ctx).await,
            Task::MainStyle => styles::main_style(&self.ctx).await,
            Task::PageStyles => styles::page_styles(&self.ctx).await,
            Task::Scripts => bundler::scripts(&self.ctx).await,
            Task::ExternalScripts => assets::external_scripts(&self.ctx).await,
            Task::Images => assets::images(&self.ctx).await,
        }
    }
}

#[async_trait]
impl TaskExecutor for Pipeline {
    async fn execute(&self, task: Task) -> Result<TaskReport> {
        let start = Instant::now();
        debug!("Starting '{}' ({})", task, self.ctx.mode);

        let mut report = self
            .dispatch(task)
            .await
            .with_context(|| format!("Task '{}' failed", task))?;
        report.elapsed = start.elapsed();

        debug!(
            "Finished '{}' in {:?}: {} file(s), {} error(s)",
            task,
            report.elapsed,
            report.outputs.len(),
            report.errors.len()
        );

        Ok(report)
    }
}

/// Delete the output tree of the current mode
pub fn clean(ctx: &BuildContext) -> Result<TaskReport> {
    let base = &ctx.output().base;

    eprintln!(
        "\n\t{} Cleaning {} folder for fresh start.\n",
        "ℹ".blue(),
        base
    );

    let dir = ctx.config.path(base);
    remove_dir(&dir).with_context(|| format!("Failed to remove {}", dir.display()))?;

    Ok(TaskReport::new(Task::Clean))
}

/// Remove a directory tree; a missing directory is not an error
///
/// Returns whether anything was removed.
pub fn remove_dir(dir: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
