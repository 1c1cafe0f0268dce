//! Module graph built while walking imports from the entries

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Unique identifier for a module
pub type ModuleId = usize;

/// What a file is loaded as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleType {
    JavaScript,
    Json,
    Unknown,
}

impl ModuleType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" => ModuleType::JavaScript,
            "json" => ModuleType::Json,
            _ => ModuleType::Unknown,
        }
    }

    /// Whether imports should be scanned for
    pub fn is_js_like(&self) -> bool {
        matches!(self, ModuleType::JavaScript)
    }
}

/// One source file
#[derive(Debug, Clone)]
pub struct Module {
    /// Stable name used in bundles (path relative to the project root)
    pub name: String,

    /// Canonical path
    pub path: PathBuf,

    pub source: String,

    pub module_type: ModuleType,

    /// Import specifiers in source order
    pub dependencies: Vec<String>,

    /// Specifier -> resolved module
    pub resolved: BTreeMap<String, ModuleId>,

    /// CommonJS code emitted into bundles
    pub transformed: Option<String>,
}

impl Module {
    pub fn detect_type(path: &Path) -> ModuleType {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(ModuleType::from_extension)
            .unwrap_or(ModuleType::Unknown)
    }
}

/// Modules and their import edges
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,

    path_to_id: HashMap<PathBuf, ModuleId>,

    /// Ordered so chunk contents do not depend on hash order
    edges: HashMap<ModuleId, BTreeSet<ModuleId>>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module; a path already present keeps its id
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        if let Some(&id) = self.path_to_id.get(&module.path) {
            return id;
        }

        let id = self.modules.len();
        self.path_to_id.insert(module.path.clone(), id);
        self.modules.push(module);
        self.edges.insert(id, BTreeSet::new());

        id
    }

    /// Record that `specifier` in `from` resolved to `to`
    pub fn add_dependency(&mut self, from: ModuleId, specifier: &str, to: ModuleId) {
        if let Some(deps) = self.edges.get_mut(&from) {
            deps.insert(to);
        }
        if let Some(module) = self.modules.get_mut(from) {
            module.resolved.insert(specifier.to_string(), to);
        }
    }

    pub fn get_module_id(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn get_module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(id)
    }

    pub fn all_module_ids(&self) -> Vec<ModuleId> {
        (0..self.modules.len()).collect()
    }

    /// Every module `start` pulls in, itself included
    pub fn get_reachable_modules(&self, start: ModuleId) -> BTreeSet<ModuleId> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        visited.insert(start);

        while let Some(id) = queue.pop_front() {
            if let Some(deps) = self.edges.get(&id) {
                for &dep_id in deps {
                    if visited.insert(dep_id) {
                        queue.push_back(dep_id);
                    }
                }
            }
        }

        visited
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn module(path: &str) -> Module {
        Module {
            name: path.trim_start_matches('/').to_string(),
            path: PathBuf::from(path),
            source: String::new(),
            module_type: ModuleType::JavaScript,
            dependencies: vec![],
            resolved: BTreeMap::new(),
            transformed: None,
        }
    }

    #[test]
    fn test_module_type_detection() {
        assert_eq!(ModuleType::from_extension("js"), ModuleType::JavaScript);
        assert_eq!(ModuleType::from_extension("MJS"), ModuleType::JavaScript);
        assert_eq!(ModuleType::from_extension("json"), ModuleType::Json);
        assert_eq!(ModuleType::from_extension("ts"), ModuleType::Unknown);
    }

    #[test]
    fn test_module_graph_basic() {
        let mut graph = ModuleGraph::new();

        let id = graph.add_module(module("/test/main.js"));
        assert_eq!(graph.len(), 1);
        assert!(graph.get_module(id).is_some());
        assert_eq!(graph.get_module_id(Path::new("/test/main.js")), Some(id));

        // same path is not added twice
        assert_eq!(graph.add_module(module("/test/main.js")), id);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_reachable_modules() {
        let mut graph = ModuleGraph::new();
        let main = graph.add_module(module("/main.js"));
        let a = graph.add_module(module("/a.js"));
        let b = graph.add_module(module("/b.js"));
        let orphan = graph.add_module(module("/orphan.js"));

        graph.add_dependency(main, "./a", a);
        graph.add_dependency(a, "./b", b);
        graph.add_dependency(b, "./a", a);

        let reachable = graph.get_reachable_modules(main);
        assert_eq!(reachable, BTreeSet::from([main, a, b]));
        assert!(!reachable.contains(&orphan));
        assert_eq!(graph.get_module(main).unwrap().resolved["./a"], a);
        assert_eq!(graph.get_reachable_modules(b), BTreeSet::from([a, b]));
    }
}
