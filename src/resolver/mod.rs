//! Module resolution
//!
//! Handles extracting import specifiers from scripts and resolving them to
//! files on disk, either relative to the importer or from `node_modules`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::bundler::minify::strip_comments;
use crate::bundler::ModuleType;

/// Static `import`/`export ... from` statements and `require` calls
static IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^\w$.])(?:import|export)\s*(?:[\w$*{}\s,]+?\s*from\s*)?["']([^"']+)["']|(?:^|[^\w$.])require\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

static DYNAMIC_IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^\w$.])import\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

/// Extensions tried, in order, when a specifier has none
const EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "json"];

/// Module resolver
#[derive(Debug, Clone, Default)]
pub struct Resolver;

impl Resolver {
    /// Create a new resolver
    pub fn new() -> Self {
        Self
    }

    /// Extract import/require dependencies from source code
    pub fn extract_dependencies(&self, source: &str, module_type: &ModuleType) -> Vec<String> {
        if !module_type.is_js_like() {
            return Vec::new();
        }

        let code = strip_comments(source);
        let mut dependencies = Vec::new();

        let statics = IMPORT_REGEX
            .captures_iter(&code)
            .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)));
        let dynamics = DYNAMIC_IMPORT_REGEX
            .captures_iter(&code)
            .filter_map(|cap| cap.get(1));

        for specifier in statics.chain(dynamics) {
            let spec = specifier.as_str().to_string();
            if !dependencies.contains(&spec) {
                dependencies.push(spec);
            }
        }

        debug!("Found {} dependencies", dependencies.len());

        dependencies
    }

    /// Resolve an import specifier to an absolute file path
    pub fn resolve(&self, specifier: &str, from: &Path) -> Result<Option<PathBuf>> {
        debug!("Resolving '{}' from '{}'", specifier, from.display());

        let base_dir = from.parent().unwrap_or(Path::new("."));

        let resolved = if specifier.starts_with('.') || specifier.starts_with('/') {
            self.resolve_relative(specifier, base_dir)?
        } else {
            self.resolve_bare(specifier, base_dir)?
        };

        debug!("Resolved to: {:?}", resolved);

        Ok(resolved)
    }

    /// Resolve a path-like import
    fn resolve_relative(&self, specifier: &str, base_dir: &Path) -> Result<Option<PathBuf>> {
        let target = base_dir.join(specifier);

        if target.is_file() {
            return Ok(Some(target));
        }

        // `./util` -> `./util.js`, keeping any dots already in the name
        for ext in EXTENSIONS {
            let mut with_ext = target.clone().into_os_string();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return Ok(Some(with_ext));
            }
        }

        if target.is_dir() {
            for ext in EXTENSIONS {
                let index = target.join(format!("index.{}", ext));
                if index.is_file() {
                    return Ok(Some(index));
                }
            }
        }

        Ok(None)
    }

    /// Resolve a bare import by walking up through `node_modules` directories
    fn resolve_bare(&self, specifier: &str, from_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current = from_dir.to_path_buf();

        loop {
            let node_modules = current.join("node_modules");

            if node_modules.is_dir() {
                if let Some(resolved) = self.resolve_in_node_modules(&node_modules, specifier)? {
                    return Ok(Some(resolved));
                }
            }

            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve a module within a node_modules directory
    fn resolve_in_node_modules(
        &self,
        node_modules: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>> {
        let (package_name, subpath) = split_package(specifier);

        let package_dir = node_modules.join(&package_name);
        if !package_dir.is_dir() {
            return Ok(None);
        }

        if let Some(sub) = subpath {
            return self.resolve_relative(&sub, &package_dir);
        }

        let package_json = package_dir.join("package.json");
        if package_json.is_file() {
            let content = fs::read_to_string(&package_json)
                .with_context(|| format!("Failed to read {}", package_json.display()))?;
            let pkg: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", package_json.display()))?;

            for field in ["module", "main"] {
                if let Some(entry) = pkg.get(field).and_then(|v| v.as_str()) {
                    if let Some(resolved) = self.resolve_relative(entry, &package_dir)? {
                        return Ok(Some(resolved));
                    }
                }
            }
        }

        self.resolve_relative("index", &package_dir)
    }
}

/// Split `@scope/name/sub/path` or `name/sub/path` into package and subpath
fn split_package(specifier: &str) -> (String, Option<String>) {
    let segments = if specifier.starts_with('@') { 2 } else { 1 };
    let parts: Vec<&str> = specifier.splitn(segments + 1, '/').collect();

    if parts.len() <= segments {
        return (specifier.to_string(), None);
    }

    (parts[..segments].join("/"), Some(parts[segments].to_string()))
}
