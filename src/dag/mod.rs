//! Dependency-aware batching.
//!
//! - `imports`: finds dependency declarations in pseudocode
//! - `graph`: builds the file dependency graph and orders it
//! - `scheduler`: splits files into verification batches

pub mod graph;
pub mod imports;
pub mod scheduler;

pub use graph::{CycleDetected, DependencyGraph, GraphBuilder, dependency_summary};
pub use imports::ImportPatterns;
pub use scheduler::{Batch, BatchStrategy, batch, batch_by_type, plan_batches};
