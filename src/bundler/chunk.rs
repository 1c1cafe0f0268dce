//! Chunk generation for code splitting

use std::collections::{BTreeMap, BTreeSet};

use super::graph::{ModuleGraph, ModuleId};

/// Type of chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkType {
    /// Entry point chunk - runs its entry module when loaded
    Entry,
    /// Shared chunk - contains modules used by multiple entry points
    Shared,
}

/// A chunk is a group of modules that will be bundled together
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk name (used for output filename)
    pub name: String,

    /// Type of chunk
    pub chunk_type: ChunkType,

    /// Module to execute once the chunk has loaded
    pub entry: Option<ModuleId>,

    /// Module IDs included in this chunk
    pub module_ids: BTreeSet<ModuleId>,
}

impl Chunk {
    /// Create a new entry chunk
    pub fn entry(name: String, entry: ModuleId, module_ids: BTreeSet<ModuleId>) -> Self {
        Self {
            name,
            chunk_type: ChunkType::Entry,
            entry: Some(entry),
            module_ids,
        }
    }

    /// Create a new shared chunk
    pub fn shared(name: String, module_ids: BTreeSet<ModuleId>) -> Self {
        Self {
            name,
            chunk_type: ChunkType::Shared,
            entry: None,
            module_ids,
        }
    }

    /// Output file name
    pub fn file_name(&self) -> String {
        format!("{}.js", self.name)
    }

    /// Check if chunk is empty
    pub fn is_empty(&self) -> bool {
        self.module_ids.is_empty()
    }

    /// Number of modules in chunk
    pub fn len(&self) -> usize {
        self.module_ids.len()
    }
}

/// Split entry graphs into one chunk per entry plus a shared chunk
///
/// A module reachable from two or more entries is placed in the chunk named
/// `shared_name` exactly once. When that name is itself an entry, the shared
/// modules join that entry's chunk; otherwise a separate shared chunk is
/// emitted. Every other module lives in the single entry chunk reaching it.
pub fn split_chunks(
    graph: &ModuleGraph,
    entries: &BTreeMap<String, ModuleId>,
    shared_name: &str,
) -> Vec<Chunk> {
    let reachable: BTreeMap<&String, BTreeSet<ModuleId>> = entries
        .iter()
        .map(|(name, &id)| (name, graph.get_reachable_modules(id)))
        .collect();

    let mut usage: BTreeMap<ModuleId, usize> = BTreeMap::new();
    for modules in reachable.values() {
        for &id in modules {
            *usage.entry(id).or_default() += 1;
        }
    }

    let shared: BTreeSet<ModuleId> = usage
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(id, _)| id)
        .collect();

    let mut chunks = Vec::with_capacity(entries.len() + 1);

    for (name, modules) in reachable {
        let mut own: BTreeSet<ModuleId> = modules.difference(&shared).copied().collect();
        if name == shared_name {
            own.extend(shared.iter().copied());
        }
        chunks.push(Chunk::entry(name.clone(), entries[name], own));
    }

    if !shared.is_empty() && !entries.contains_key(shared_name) {
        chunks.push(Chunk::shared(shared_name.to_string(), shared));
    }

    chunks
}
