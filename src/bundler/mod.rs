//! Script bundler
//!
//! Builds a module graph from every entry, splits it into one chunk per
//! entry plus the shared chunk, and renders each chunk as a self-contained
//! script on top of a tiny module registry.

mod chunk;
mod graph;
pub mod minify;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::BuildContext;
use crate::entries::{discover_entries, EntryMap};
use crate::pipeline::{Task, TaskReport};
use crate::resolver::Resolver;
use crate::transform::Transformer;
use crate::utils::{path_to_slash, relative_path, write_file, FsLister};

pub use chunk::{split_chunks, Chunk, ChunkType};
pub use graph::{Module, ModuleGraph, ModuleId, ModuleType};

/// Errors that fail a bundle run without stopping the build
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Entry '{name}' not found: {}", path.display())]
    MissingEntry { name: String, path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Module not found: '{specifier}' imported from {importer}")]
    Unresolved { specifier: String, importer: String },

    #[error("Failed to resolve '{specifier}' from {importer}: {message}")]
    Resolve {
        specifier: String,
        importer: String,
        message: String,
    },

    #[error("Cannot bundle {importer}: no loader for {}", path.display())]
    Unsupported { path: PathBuf, importer: String },

    #[error("Failed to transform {name}: {message}")]
    Transform { name: String, message: String },
}

/// A rendered chunk
#[derive(Debug, Clone)]
pub struct BundleInfo {
    /// Chunk name, also the output path below the script output directory
    pub name: String,

    pub code: String,
}

impl BundleInfo {
    pub fn file_name(&self) -> String {
        format!("{}.js", self.name)
    }
}

/// Defines `__sluice__` once per page, however many bundles load
const RUNTIME: &str = r#"(function (g) {
  if (g.__sluice__) return;
  var defs = {};
  var cache = {};
  function load(id) {
    if (cache[id]) return cache[id].exports;
    var def = defs[id];
    if (!def) throw new Error("Module not found: " + id);
    var module = (cache[id] = { exports: {} });
    def.fn.call(module.exports, module, module.exports, function (spec) {
      if (!Object.prototype.hasOwnProperty.call(def.deps, spec)) {
        throw new Error("Cannot find module '" + spec + "' from " + id);
      }
      return load(def.deps[spec]);
    });
    return module.exports;
  }
  g.__sluice__ = {
    define: function (id, deps, fn) {
      if (!defs[id]) defs[id] = { deps: deps, fn: fn };
    },
    require: load
  };
})(typeof self !== "undefined" ? self : this);
"#;

/// The script bundler
pub struct Bundler {
    ctx: BuildContext,

    /// Canonical project root, module names are relative to it
    root: PathBuf,

    resolver: Resolver,

    transformer: Transformer,
}

impl Bundler {
    /// Create a new bundler instance
    pub fn new(ctx: BuildContext) -> Self {
        let root = fs::canonicalize(&ctx.config.root).unwrap_or_else(|_| ctx.config.root.clone());

        Self {
            ctx,
            root,
            resolver: Resolver::new(),
            transformer: Transformer::new(),
        }
    }

    /// Bundle every entry; nothing is returned unless every entry succeeded
    pub fn bundle(&self, entries: &EntryMap) -> Result<Vec<BundleInfo>, BundleError> {
        let mut graph = ModuleGraph::new();
        let mut entry_ids = BTreeMap::new();

        for (name, path) in entries {
            debug!("Processing entrypoint: {} -> {}", name, path.display());
            if !path.is_file() {
                return Err(BundleError::MissingEntry {
                    name: name.clone(),
                    path: path.clone(),
                });
            }
            let id = self.process_module(&mut graph, path, name)?;
            entry_ids.insert(name.clone(), id);
        }

        self.transform_modules(&mut graph)?;

        let chunks = split_chunks(&graph, &entry_ids, &self.ctx.config.scripts.shared_chunk);
        debug!("{} modules in {} chunks", graph.len(), chunks.len());

        Ok(chunks
            .iter()
            .map(|chunk| BundleInfo {
                name: chunk.name.clone(),
                code: self.render_chunk(&graph, chunk),
            })
            .collect())
    }

    /// Add a module and everything it imports to the graph
    fn process_module(
        &self,
        graph: &mut ModuleGraph,
        path: &Path,
        importer: &str,
    ) -> Result<ModuleId, BundleError> {
        let read_error = |source| BundleError::Read {
            path: path.to_path_buf(),
            source,
        };

        let canonical_path = fs::canonicalize(path).map_err(read_error)?;
        if let Some(id) = graph.get_module_id(&canonical_path) {
            return Ok(id);
        }

        let module_type = Module::detect_type(&canonical_path);
        if module_type == ModuleType::Unknown {
            return Err(BundleError::Unsupported {
                path: canonical_path,
                importer: importer.to_string(),
            });
        }

        let source = fs::read_to_string(&canonical_path).map_err(read_error)?;
        let dependencies = self.resolver.extract_dependencies(&source, &module_type);
        let name = relative_path(&self.root, &canonical_path)
            .unwrap_or_else(|| path_to_slash(&canonical_path));

        let module_id = graph.add_module(Module {
            name: name.clone(),
            path: canonical_path.clone(),
            source,
            module_type,
            dependencies: dependencies.clone(),
            resolved: BTreeMap::new(),
            transformed: None,
        });

        for specifier in dependencies {
            let resolved = self
                .resolver
                .resolve(&specifier, &canonical_path)
                .map_err(|e| BundleError::Resolve {
                    specifier: specifier.clone(),
                    importer: name.clone(),
                    message: format!("{:#}", e),
                })?
                .ok_or_else(|| BundleError::Unresolved {
                    specifier: specifier.clone(),
                    importer: name.clone(),
                })?;

            let dep_id = self.process_module(graph, &resolved, &name)?;
            graph.add_dependency(module_id, &specifier, dep_id);
        }

        Ok(module_id)
    }

    /// Transform all modules in the graph
    fn transform_modules(&self, graph: &mut ModuleGraph) -> Result<(), BundleError> {
        for id in graph.all_module_ids() {
            let Some(module) = graph.get_module_mut(id) else {
                continue;
            };

            let transformed = self
                .transformer
                .transform(&module.source, &module.path, &module.module_type)
                .map_err(|e| BundleError::Transform {
                    name: module.name.clone(),
                    message: format!("{:#}", e),
                })?;
            module.transformed = Some(transformed);
        }

        Ok(())
    }

    /// Render one chunk: runtime, module definitions, then the entry call
    fn render_chunk(&self, graph: &ModuleGraph, chunk: &Chunk) -> String {
        let mut code = String::from(RUNTIME);

        let mut modules: Vec<&Module> = chunk
            .module_ids
            .iter()
            .filter_map(|&id| graph.get_module(id))
            .collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));

        for module in modules {
            let deps: BTreeMap<&str, &str> = module
                .resolved
                .iter()
                .filter_map(|(spec, &id)| graph.get_module(id).map(|m| (spec.as_str(), m.name.as_str())))
                .collect();
            let body = module.transformed.as_deref().unwrap_or(&module.source);

            code.push_str(&format!(
                "\n// Module: {}\n__sluice__.define({}, {}, function (module, exports, require) {{\n{}\n}});\n",
                module.name,
                json_string(&module.name),
                serde_json::to_string(&deps).unwrap_or_else(|_| "{}".to_string()),
                body.trim_end()
            ));
        }

        if let Some(entry) = chunk.entry.and_then(|id| graph.get_module(id)) {
            code.push_str(&format!("\n__sluice__.require({});\n", json_string(&entry.name)));
        }

        if self.ctx.mode.is_production() {
            minify::minify(&code)
        } else {
            code
        }
    }
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Bundle the script entries into the script output directory
///
/// Bundle failures are reported, not raised; when one entry fails nothing
/// is written for any of them.
pub async fn scripts(ctx: &BuildContext) -> Result<TaskReport> {
    let ctx = ctx.clone();
    tokio::task::spawn_blocking(move || scripts_blocking(&ctx)).await?
}

fn scripts_blocking(ctx: &BuildContext) -> Result<TaskReport> {
    let mut report = TaskReport::new(Task::Scripts);
    let config = &ctx.config;

    let js_root = config.path(&config.paths.src.js);
    let entries = discover_entries(&js_root, &config.scripts.main, &FsLister)
        .with_context(|| format!("Failed to list {}", js_root.display()))?;

    let bundles = match Bundler::new(ctx.clone()).bundle(&entries) {
        Ok(bundles) => bundles,
        Err(err) => {
            report.fail(err.to_string());
            return Ok(report);
        }
    };

    let out_dir = config.path(&ctx.output().js);
    for bundle in bundles {
        let target = out_dir.join(bundle.file_name());
        write_file(&target, &bundle.code)
            .with_context(|| format!("Failed to write bundle: {}", target.display()))?;
        debug!("Wrote {}", target.display());
        report.output(target);
    }

    info!("Bundled {} entries into {}", entries.len(), out_dir.display());

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{Config, Mode};

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let js = dir.path().join("src/js");
        write_file(&js.join("main.js"), "import { greet } from './shared/greet';\ngreet('main');\n").unwrap();
        write_file(
            &js.join("shared/greet.js"),
            "// say hello\nexport function greet(who) {\n  console.log('hello ' + who);\n}\n",
        )
        .unwrap();
        write_file(
            &js.join("pages/about.js"),
            "import { greet } from '../shared/greet';\nimport data from '../data.json';\ngreet(data.page);\n",
        )
        .unwrap();
        write_file(&js.join("data.json"), r#"{"page": "about"}"#).unwrap();
        dir
    }

    fn ctx(root: &Path, mode: Mode) -> BuildContext {
        BuildContext::new(Arc::new(Config::default_config(fs::canonicalize(root).unwrap())), mode)
    }

    fn entries(root: &Path) -> EntryMap {
        discover_entries(&root.join("src/js"), "main.js", &FsLister).unwrap()
    }

    #[test]
    fn test_bundle_places_shared_module_in_main() {
        let dir = project();
        let ctx = ctx(dir.path(), Mode::Development);

        let bundles = Bundler::new(ctx).bundle(&entries(dir.path())).unwrap();

        assert_eq!(bundles.len(), 2);
        let main = bundles.iter().find(|b| b.name == "main").unwrap();
        let about = bundles.iter().find(|b| b.name == "pages/about").unwrap();

        assert!(main.code.contains(r#"__sluice__.define("src/js/shared/greet.js""#));
        assert!(!about.code.contains(r#"define("src/js/shared/greet.js""#));
        assert!(about.code.contains(r#""../shared/greet":"src/js/shared/greet.js""#));
        assert!(about.code.contains(r#"module.exports = {"page": "about"};"#));
        assert!(about.code.ends_with("__sluice__.require(\"src/js/pages/about.js\");\n"));
        assert!(main.code.contains("// say hello"));
    }

    #[test]
    fn test_separate_shared_chunk() {
        let dir = project();
        let mut config = Config::default_config(fs::canonicalize(dir.path()).unwrap());
        config.scripts.shared_chunk = "common".to_string();
        let ctx = BuildContext::new(Arc::new(config), Mode::Development);

        let bundles = Bundler::new(ctx).bundle(&entries(dir.path())).unwrap();

        let names: Vec<&str> = bundles.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["main", "pages/about", "common"]);
        let common = &bundles[2];
        assert!(common.code.contains("shared/greet.js"));
        assert!(!common.code.contains("__sluice__.require(\"src"));
    }

    #[test]
    fn test_production_bundle_is_minified() {
        let dir = project();

        let bundles = Bundler::new(ctx(dir.path(), Mode::Production))
            .bundle(&entries(dir.path()))
            .unwrap();

        let main = bundles.iter().find(|b| b.name == "main").unwrap();
        assert!(!main.code.contains("// say hello"));
        assert!(!main.code.contains("// Module:"));
        assert!(!main.code.contains("\n\n"));
    }

    #[test]
    fn test_unresolved_import_fails_every_entry() {
        let dir = project();
        write_file(
            &dir.path().join("src/js/pages/broken.js"),
            "import nothing from './does-not-exist';\n",
        )
        .unwrap();

        let err = Bundler::new(ctx(dir.path(), Mode::Development))
            .bundle(&entries(dir.path()))
            .unwrap_err();

        assert!(matches!(err, BundleError::Unresolved { ref specifier, .. } if specifier == "./does-not-exist"));
    }

    #[test]
    fn test_missing_main_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("src/js/pages/about.js"), "").unwrap();

        let err = Bundler::new(ctx(dir.path(), Mode::Development))
            .bundle(&entries(dir.path()))
            .unwrap_err();

        assert!(matches!(err, BundleError::MissingEntry { ref name, .. } if name == "main"));
    }

    #[tokio::test]
    async fn test_scripts_task_writes_nothing_on_error() {
        let dir = project();
        write_file(&dir.path().join("src/js/pages/broken.js"), "import './nope';\n").unwrap();
        let ctx = ctx(dir.path(), Mode::Development);

        let report = scripts(&ctx).await.unwrap();

        assert_eq!(report.errors.len(), 1);
        assert!(report.outputs.is_empty());
        assert!(!dir.path().join("dist/js").exists());
    }

    #[tokio::test]
    async fn test_scripts_task_writes_bundles() {
        let dir = project();
        let ctx = ctx(dir.path(), Mode::Production);

        let report = scripts(&ctx).await.unwrap();

        assert!(report.is_ok());
        assert!(dir.path().join("build/js/main.js").is_file());
        assert!(dir.path().join("build/js/pages/about.js").is_file());
        assert!(!dir.path().join("dist").exists());
    }
}
