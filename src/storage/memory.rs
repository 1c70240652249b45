//! In-memory artifact store, used for dry runs and tests.

use super::{ArtifactKind, ArtifactStore, check_relative};
use crate::errors::StorageError;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<BTreeMap<(ArtifactKind, String), String>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an artifact, ignoring path validation.
    pub fn with(self, kind: ArtifactKind, path: &str, content: &str) -> Self {
        self.lock().insert(key(kind, path), content.to_string());
        self
    }

    pub fn remove(&self, kind: ArtifactKind, path: &str) -> Option<String> {
        self.lock().remove(&key(kind, path))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(ArtifactKind, String), String>> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn key(kind: ArtifactKind, path: &str) -> (ArtifactKind, String) {
    (kind, path.to_string())
}

impl ArtifactStore for MemoryArtifactStore {
    fn read(&self, kind: ArtifactKind, path: &str) -> Result<String, StorageError> {
        self.lock()
            .get(&key(kind, path))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })
    }

    fn write(&self, kind: ArtifactKind, path: &str, content: &str) -> Result<(), StorageError> {
        check_relative(path)?;
        self.lock().insert(key(kind, path), content.to_string());
        Ok(())
    }

    fn list(&self, kind: ArtifactKind) -> Result<Vec<String>, StorageError> {
        Ok(self
            .lock()
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, path)| path.clone())
            .collect())
    }
}
