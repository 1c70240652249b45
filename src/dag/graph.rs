//! Dependency graph over tracked files.
//!
//! An edge `A -> B` means B imports A, so A should be verified first.
//! The graph is rebuilt from pseudocode each time it is needed and is never
//! persisted.

use super::imports::{ImportPatterns, resolve_reference};
use crate::extract::Extraction;
use crate::registry::Registry;
use crate::storage::{ArtifactKind, ArtifactStore};
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::cmp::Reverse;
use tracing::{debug, info, warn};

/// Index into the node list.
pub type NodeIndex = usize;

/// Nodes that could not be ordered because they sit on or behind a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDetected {
    pub involved: Vec<String>,
}

impl std::fmt::Display for CycleDetected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cycle in file dependencies involving {:?}", self.involved)
    }
}

impl std::error::Error for CycleDetected {}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Paths in registry insertion order
    nodes: Vec<String>,
    index_map: HashMap<String, NodeIndex>,
    /// index -> files that depend on it
    forward_edges: Vec<Vec<NodeIndex>>,
    /// index -> files it depends on
    reverse_edges: Vec<Vec<NodeIndex>>,
}

impl DependencyGraph {
    /// A graph over `paths` with no edges.
    pub fn isolated<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = Self::default();
        for path in paths {
            graph.add_node(path);
        }
        graph
    }

    pub fn add_node(&mut self, path: impl Into<String>) -> NodeIndex {
        let path = path.into();
        if let Some(&index) = self.index_map.get(&path) {
            return index;
        }
        let index = self.nodes.len();
        self.index_map.insert(path.clone(), index);
        self.nodes.push(path);
        self.forward_edges.push(Vec::new());
        self.reverse_edges.push(Vec::new());
        index
    }

    /// Record that `dependent` depends on `dependency`. Self edges and
    /// duplicates are ignored; unknown paths are added as nodes.
    pub fn add_dependency(&mut self, dependency: &str, dependent: &str) -> bool {
        if dependency == dependent {
            return false;
        }
        let from = self.add_node(dependency);
        let to = self.add_node(dependent);
        if self.forward_edges[from].contains(&to) {
            return false;
        }
        self.forward_edges[from].push(to);
        self.reverse_edges[to].push(from);
        true
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.forward_edges.iter().map(Vec::len).sum()
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn index_of(&self, path: &str) -> Option<NodeIndex> {
        self.index_map.get(path).copied()
    }

    /// Paths that `path` depends on.
    pub fn dependencies_of(&self, path: &str) -> Vec<&str> {
        self.index_of(path)
            .map(|i| {
                self.reverse_edges[i]
                    .iter()
                    .map(|&d| self.nodes[d].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Paths that depend on `path`.
    pub fn dependents_of(&self, path: &str) -> Vec<&str> {
        self.index_of(path)
            .map(|i| {
                self.forward_edges[i]
                    .iter()
                    .map(|&d| self.nodes[d].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All edges as `(dependency, dependent)` pairs, by dependency order.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.forward_edges
            .iter()
            .enumerate()
            .flat_map(|(from, tos)| {
                tos.iter()
                    .map(move |&to| (self.nodes[from].as_str(), self.nodes[to].as_str()))
            })
            .collect()
    }

    /// Kahn's algorithm restricted to `subset`; ties go to the earlier
    /// position in `subset`. Edges to paths outside `subset` are ignored.
    pub fn topological_order(&self, subset: &[String]) -> Result<Vec<String>, CycleDetected> {
        let position: HashMap<&str, usize> = subset
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; subset.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); subset.len()];
        for (pos, path) in subset.iter().enumerate() {
            for dep in self.dependencies_of(path) {
                if let Some(&dep_pos) = position.get(dep) {
                    in_degree[pos] += 1;
                    dependents[dep_pos].push(pos);
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(subset.len());
        while let Some(Reverse(pos)) = ready.pop() {
            order.push(subset[pos].clone());
            for &next in &dependents[pos] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() != subset.len() {
            let involved = in_degree
                .iter()
                .enumerate()
                .filter(|(_, deg)| **deg > 0)
                .map(|(i, _)| subset[i].clone())
                .collect();
            return Err(CycleDetected { involved });
        }
        Ok(order)
    }
}

/// Builds a [`DependencyGraph`] from the pseudocode of every tracked file.
pub struct GraphBuilder<'a> {
    registry: &'a Registry,
    store: &'a dyn ArtifactStore,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(registry: &'a Registry, store: &'a dyn ArtifactStore) -> Self {
        Self { registry, store }
    }

    /// Build the graph. Any failure degrades to every node with no edges.
    pub fn build(self) -> DependencyGraph {
        match self.try_build() {
            Ok(graph) => {
                info!(
                    nodes = graph.len(),
                    edges = graph.edge_count(),
                    "Dependency graph built"
                );
                graph
            }
            Err(e) => {
                warn!(error = %e, "Dependency graph build failed, batching without edges");
                DependencyGraph::isolated(self.registry.paths())
            }
        }
    }

    fn try_build(&self) -> Result<DependencyGraph, regex::Error> {
        let patterns = ImportPatterns::new()?;
        let mut graph = DependencyGraph::isolated(self.registry.paths());

        for path in self.registry.paths() {
            let pseudocode = match self.store.read(ArtifactKind::Pseudocode, path) {
                Ok(content) => content,
                Err(e) => {
                    debug!(file = %path, error = %e, "No pseudocode to scan for imports");
                    continue;
                }
            };
            let section = match patterns.dependency_section(&pseudocode) {
                Extraction::Parsed(section) => section,
                Extraction::Fallback(reason) => {
                    debug!(file = %path, %reason, "Skipping import scan");
                    continue;
                }
            };
            for reference in patterns.references(section) {
                match resolve_reference(&reference, path, |p| self.registry.contains(p)) {
                    Some(dependency) if dependency != path => {
                        graph.add_dependency(&dependency, path);
                    }
                    Some(_) => {}
                    None => debug!(file = %path, %reference, "Reference is not a tracked file"),
                }
            }
        }
        Ok(graph)
    }
}

/// One line per file with its dependencies section, used as shared context
/// when verifying pseudocode in batches.
pub fn dependency_summary(registry: &Registry, store: &dyn ArtifactStore) -> String {
    let patterns = match ImportPatterns::new() {
        Ok(patterns) => patterns,
        Err(e) => {
            warn!(error = %e, "Cannot compile import patterns for the dependency summary");
            return String::new();
        }
    };
    let mut lines = Vec::new();
    for path in registry.paths() {
        let Ok(pseudocode) = store.read(ArtifactKind::Pseudocode, path) else {
            continue;
        };
        let deps = match patterns.dependency_section(&pseudocode) {
            Extraction::Parsed(section) => section
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
            Extraction::Fallback(_) => "none declared".to_string(),
        };
        lines.push(format!("File {path}: {deps}"));
    }
    lines.join("\n")
}

/// Paths referenced by edges, deduplicated. Handy for display.
pub fn connected_paths(graph: &DependencyGraph) -> BTreeSet<&str> {
    graph
        .edges()
        .into_iter()
        .flat_map(|(a, b)| [a, b])
        .collect()
}
