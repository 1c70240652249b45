//! Splitting files into verification batches.
//!
//! With a dependency graph, files are ordered so that a dependency lands in
//! the same or an earlier batch than anything importing it. Without one,
//! files are grouped by type. Either way each batch holds at most
//! `batch_size` files and the result depends only on the inputs.

use super::graph::DependencyGraph;
use crate::registry::{FileType, TrackedFile};
use std::collections::HashMap;
use tracing::info;

/// An ordered group of files verified together.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub files: Vec<TrackedFile>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }
}

/// How a batch list was ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStrategy {
    ByType,
    Dependency,
    /// A cycle forced input order
    InputOrder,
}

impl std::fmt::Display for BatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStrategy::ByType => write!(f, "type"),
            BatchStrategy::Dependency => write!(f, "dependency order"),
            BatchStrategy::InputOrder => write!(f, "input order (cycle)"),
        }
    }
}

/// Batch `files`, by dependency order when a graph is supplied.
pub fn batch(
    files: &[TrackedFile],
    batch_size: usize,
    graph: Option<&DependencyGraph>,
) -> Vec<Batch> {
    plan_batches(files, batch_size, graph).0
}

/// Like [`batch`], also reporting the strategy that was used.
pub fn plan_batches(
    files: &[TrackedFile],
    batch_size: usize,
    graph: Option<&DependencyGraph>,
) -> (Vec<Batch>, BatchStrategy) {
    if files.is_empty() {
        return (Vec::new(), BatchStrategy::ByType);
    }
    match graph {
        None => (batch_by_type(files, batch_size), BatchStrategy::ByType),
        Some(graph) => {
            let (ordered, strategy) = dependency_order(files, graph);
            (chunk(ordered, batch_size), strategy)
        }
    }
}

/// Group by canonical type (frontend, backend, config, other), chunking each group.
pub fn batch_by_type(files: &[TrackedFile], batch_size: usize) -> Vec<Batch> {
    FileType::BATCH_ORDER
        .iter()
        .flat_map(|file_type| {
            let group: Vec<TrackedFile> = files
                .iter()
                .filter(|f| f.file_type() == *file_type)
                .cloned()
                .collect();
            chunk(group, batch_size)
        })
        .collect()
}

fn dependency_order(files: &[TrackedFile], graph: &DependencyGraph) -> (Vec<TrackedFile>, BatchStrategy) {
    let input: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
    match graph.topological_order(&input) {
        Ok(order) => {
            let mut by_path: HashMap<String, TrackedFile> = files
                .iter()
                .map(|f| (f.path.clone(), f.clone()))
                .collect();
            let ordered = order
                .into_iter()
                .filter_map(|path| by_path.remove(&path))
                .collect();
            (ordered, BatchStrategy::Dependency)
        }
        Err(cycle) => {
            info!(involved = ?cycle.involved, "Dependency cycle, batching in input order");
            (files.to_vec(), BatchStrategy::InputOrder)
        }
    }
}

fn chunk(files: Vec<TrackedFile>, batch_size: usize) -> Vec<Batch> {
    let size = batch_size.max(1);
    files
        .chunks(size)
        .map(|c| Batch { files: c.to_vec() })
        .collect()
}
