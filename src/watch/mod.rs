//! Watch mode
//!
//! File changes are debounced, classified into categories by glob, and
//! turned into a chain of tasks. A single worker drains the change queue and
//! runs one chain at a time, so two rebuilds never write the same output
//! concurrently. Every rebuild ends with one reload message.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::pipeline::{run_series, Task, TaskExecutor};
use crate::server::{ReloadMessage, ReloadSender};
use crate::utils::{path_to_slash, relative_path};

/// Debounce window for filesystem events
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// What kind of source file changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Html,
    Styles,
    PageStyles,
    Scripts,
    Images,
}

impl Category {
    /// Tasks re-run when a file of this category changes
    pub fn chain(self) -> &'static [Task] {
        match self {
            // pages can add or drop class names the stylesheets depend on
            Category::Html => &[Task::Html, Task::MainStyle, Task::PageStyles],
            Category::Styles => &[Task::MainStyle],
            Category::PageStyles => &[Task::PageStyles],
            Category::Scripts => &[Task::Scripts],
            Category::Images => &[Task::Images],
        }
    }
}

/// Maps changed paths to categories
#[derive(Debug, Clone)]
pub struct WatchRules {
    root: PathBuf,
    rules: Vec<(Category, GlobSet)>,
    page_styles: GlobSet,
    tailwind_config: Option<String>,
}

fn glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid watch pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// `./src/` -> `src`
fn normalize(dir: &str) -> String {
    dir.trim_start_matches("./").trim_end_matches('/').to_string()
}

impl WatchRules {
    pub fn new(config: &Config) -> Result<Self> {
        let src = &config.paths.src;
        let (base, css, js, img) = (
            normalize(&src.base),
            normalize(&src.css),
            normalize(&src.js),
            normalize(&src.img),
        );

        let page_styles = format!("{}/**/pages/*.scss", css);

        let rules = vec![
            (Category::Html, glob_set(&[format!("{}/**/*.html", base)])?),
            (Category::Styles, glob_set(&[format!("{}/**/*.scss", css)])?),
            (Category::PageStyles, glob_set(&[page_styles.clone()])?),
            (Category::Scripts, glob_set(&[format!("{}/**/*.js", js)])?),
            (Category::Images, glob_set(&[format!("{}/**/*", img)])?),
        ];

        Ok(Self {
            root: fs::canonicalize(&config.root).unwrap_or_else(|_| config.root.clone()),
            rules,
            page_styles: glob_set(&[page_styles])?,
            tailwind_config: config.styles.tailwind_config.as_deref().map(normalize),
        })
    }

    /// Path relative to the project root, with forward slashes
    fn relative(&self, path: &Path) -> Option<String> {
        if path.is_relative() {
            return Some(path_to_slash(path));
        }
        path.strip_prefix(&self.root)
            .ok()
            .map(path_to_slash)
            .or_else(|| relative_path(&self.root, path).filter(|p| !p.starts_with("..")))
    }

    /// Categories a changed path belongs to
    pub fn classify(&self, path: &Path) -> BTreeSet<Category> {
        let mut categories = BTreeSet::new();
        let Some(relative) = self.relative(path) else {
            return categories;
        };

        if self.tailwind_config.as_deref() == Some(relative.as_str()) {
            categories.insert(Category::Styles);
        }

        for (category, set) in &self.rules {
            if *category == Category::Styles && self.page_styles.is_match(&relative) {
                continue;
            }
            if set.is_match(&relative) {
                categories.insert(*category);
            }
        }

        categories
    }

    /// Task chain for a batch of changed paths
    ///
    /// Chains are concatenated in category order; a task appears once.
    pub fn plan(&self, paths: &[PathBuf]) -> Vec<Task> {
        let categories: BTreeSet<Category> =
            paths.iter().flat_map(|path| self.classify(path)).collect();

        let mut tasks = Vec::new();
        for task in categories.iter().flat_map(|c| c.chain()) {
            if !tasks.contains(task) {
                tasks.push(*task);
            }
        }
        tasks
    }
}

/// Keeps the filesystem watcher alive
pub struct Watcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

/// Directories and files to watch for a project
pub fn watch_targets(config: &Config) -> Vec<(PathBuf, RecursiveMode)> {
    let src = &config.paths.src;
    let mut dirs: Vec<PathBuf> = [&src.base, &src.css, &src.js, &src.img]
        .into_iter()
        .map(|dir| config.path(dir))
        .filter(|dir| dir.is_dir())
        .collect();
    dirs.sort();

    // nested directories are covered by their parent's recursive watch
    let mut targets: Vec<(PathBuf, RecursiveMode)> = Vec::new();
    for dir in dirs {
        if !targets.iter().any(|(parent, _)| dir.starts_with(parent)) {
            targets.push((dir, RecursiveMode::Recursive));
        }
    }

    if let Some(tailwind) = config.tailwind_config_path().filter(|p| p.is_file()) {
        targets.push((tailwind, RecursiveMode::NonRecursive));
    }

    targets
}

/// Start watching; debounced batches of changed paths are sent to `tx`
pub fn watch(
    targets: &[(PathBuf, RecursiveMode)],
    tx: mpsc::UnboundedSender<Vec<PathBuf>>,
) -> Result<Watcher> {
    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| match result {
        Ok(events) => {
            let paths: Vec<PathBuf> = events.into_iter().map(|event| event.path).collect();
            if tx.send(paths).is_err() {
                debug!("Rebuild worker has stopped");
            }
        }
        Err(e) => error!("Watch error: {:?}", e),
    })?;

    for (path, mode) in targets {
        debug!("Watching {}", path.display());
        debouncer
            .watcher()
            .watch(path, *mode)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }

    Ok(Watcher {
        _debouncer: debouncer,
    })
}

/// Run a task chain, then tell connected browsers what changed
///
/// Returns the messages that were broadcast.
pub async fn rebuild<E>(
    executor: &E,
    tasks: &[Task],
    reload_tx: &ReloadSender,
    stylesheet: &str,
) -> Vec<ReloadMessage>
where
    E: TaskExecutor + ?Sized,
{
    let mut messages = Vec::new();

    match run_series(executor, tasks).await {
        Ok(reports) => {
            for report in reports {
                for message in report.errors {
                    messages.push(ReloadMessage::Error {
                        message: format!("[{}] {}", report.task, message),
                    });
                }
            }
        }
        Err(err) => {
            error!("{:#}", err);
            messages.push(ReloadMessage::Error {
                message: format!("{:#}", err),
            });
        }
    }

    let reload = if tasks.iter().all(|task| task.is_style()) {
        ReloadMessage::CssUpdate {
            path: stylesheet.to_string(),
        }
    } else {
        ReloadMessage::FullReload {
            reason: tasks
                .iter()
                .map(|task| task.name())
                .collect::<Vec<_>>()
                .join(", "),
        }
    };
    messages.push(reload);

    eprintln!("\n\t{} Reloading Browser Preview.\n", "↻".yellow());
    for message in &messages {
        // no connected browser is fine
        let _ = reload_tx.send(message.clone());
    }

    messages
}

/// Drain the change queue, one rebuild at a time
///
/// Batches that arrive while a rebuild runs are merged into the next one.
pub async fn run_worker<E>(
    executor: &E,
    rules: &WatchRules,
    mut rx: mpsc::UnboundedReceiver<Vec<PathBuf>>,
    reload_tx: &ReloadSender,
    stylesheet: &str,
) where
    E: TaskExecutor + ?Sized,
{
    while let Some(mut paths) = rx.recv().await {
        while let Ok(more) = rx.try_recv() {
            paths.extend(more);
        }

        let tasks = rules.plan(&paths);
        if tasks.is_empty() {
            continue;
        }

        info!(
            "Change detected, running {}",
            tasks.iter().map(|t| t.name()).collect::<Vec<_>>().join(" -> ")
        );
        rebuild(executor, &tasks, reload_tx, stylesheet).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use crate::pipeline::TaskReport;
    use crate::server::channel;

    #[derive(Default)]
    struct Recorder {
        ran: Mutex<Vec<Task>>,
        broken: Option<Task>,
    }

    #[async_trait]
    impl TaskExecutor for Recorder {
        async fn execute(&self, task: Task) -> Result<TaskReport> {
            self.ran.lock().unwrap().push(task);
            let mut report = TaskReport::new(task);
            if self.broken == Some(task) {
                report.fail("expected '}'");
            }
            Ok(report)
        }
    }

    fn rules() -> WatchRules {
        let mut config = Config::default_config("/project");
        config.styles.tailwind_config = Some("tailwind.config.js".to_string());
        WatchRules::new(&config).unwrap()
    }

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(|p| PathBuf::from("/project").join(p)).collect()
    }

    #[test]
    fn test_classify() {
        let rules = rules();
        let classify = |p: &str| rules.classify(&PathBuf::from("/project").join(p));

        assert_eq!(classify("src/index.html"), BTreeSet::from([Category::Html]));
        assert_eq!(classify("src/blog/post.html"), BTreeSet::from([Category::Html]));
        assert_eq!(classify("src/css/main.scss"), BTreeSet::from([Category::Styles]));
        assert_eq!(classify("src/css/base/_reset.scss"), BTreeSet::from([Category::Styles]));
        assert_eq!(classify("src/css/pages/about.scss"), BTreeSet::from([Category::PageStyles]));
        assert_eq!(classify("tailwind.config.js"), BTreeSet::from([Category::Styles]));
        assert_eq!(classify("src/js/pages/about.js"), BTreeSet::from([Category::Scripts]));
        assert_eq!(classify("src/img/icons/logo.svg"), BTreeSet::from([Category::Images]));
    }

    #[test]
    fn test_generated_files_ignored() {
        let rules = rules();

        assert!(rules.plan(&paths(&["dist/index.html", "dist/css/style.css"])).is_empty());
        // compiled sibling written next to the source in development
        assert!(rules.plan(&paths(&["src/css/main.css"])).is_empty());
        assert!(rules.plan(&[PathBuf::from("/elsewhere/src/index.html")]).is_empty());
    }

    #[test]
    fn test_plan_concatenates_and_dedupes() {
        let rules = rules();

        let tasks = rules.plan(&paths(&[
            "src/js/main.js",
            "src/css/main.scss",
            "src/index.html",
            "src/css/pages/about.scss",
        ]));

        assert_eq!(
            tasks,
            vec![Task::Html, Task::MainStyle, Task::PageStyles, Task::Scripts]
        );
    }

    #[tokio::test]
    async fn test_page_style_change_only_rebuilds_page_styles() {
        let rules = rules();
        let recorder = Recorder::default();
        let reload_tx = channel();
        let mut reload_rx = reload_tx.subscribe();

        let tasks = rules.plan(&paths(&["src/css/pages/about.scss"]));
        assert_eq!(tasks, vec![Task::PageStyles]);

        let messages = rebuild(&recorder, &tasks, &reload_tx, "css/style.css").await;

        assert_eq!(*recorder.ran.lock().unwrap(), vec![Task::PageStyles]);
        assert_eq!(
            messages,
            vec![ReloadMessage::CssUpdate {
                path: "css/style.css".to_string()
            }]
        );
        assert_eq!(reload_rx.recv().await.unwrap(), messages[0]);
    }

    #[tokio::test]
    async fn test_errors_are_pushed_before_reload() {
        let recorder = Recorder {
            broken: Some(Task::MainStyle),
            ..Recorder::default()
        };

        let messages = rebuild(
            &recorder,
            Category::Html.chain(),
            &channel(),
            "css/style.css",
        )
        .await;

        assert_eq!(messages.len(), 2);
        assert!(matches!(&messages[0], ReloadMessage::Error { message } if message.contains("main-style")));
        assert!(matches!(&messages[1], ReloadMessage::FullReload { .. }));
        assert_eq!(recorder.ran.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_worker_merges_queued_batches() {
        let rules = rules();
        let recorder = Recorder::default();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(paths(&["src/css/main.scss"])).unwrap();
        tx.send(paths(&["src/js/main.js"])).unwrap();
        drop(tx);

        run_worker(&recorder, &rules, rx, &channel(), "css/style.css").await;

        assert_eq!(
            *recorder.ran.lock().unwrap(),
            vec![Task::MainStyle, Task::Scripts]
        );
    }

    #[test]
    fn test_watch_targets_skip_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["src/css", "src/js", "src/img"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }

        let targets = watch_targets(&Config::default_config(dir.path()));

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, dir.path().join("src"));
    }
}
