//! Persistence for the file registry.
//!
//! Reads never fail: a missing or unreadable store is an empty registry.
//! Writes go to a sibling temporary file that is renamed over the target,
//! so a reader never observes a half-written registry.

use super::Registry;
use crate::errors::PipelineError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the registry, degrading to an empty one on any problem.
    pub fn load(&self) -> Registry {
        if !self.path.exists() {
            return Registry::default();
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Registry unreadable, starting empty");
                return Registry::default();
            }
        };

        let mut registry: Registry = match serde_json::from_str(&content) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Registry corrupt, starting empty");
                return Registry::default();
            }
        };

        for path in registry.normalize() {
            warn!(file = %path, "Cleared phase flags set above an incomplete phase");
        }
        registry
    }

    /// Persist the registry atomically.
    pub fn save(&self, registry: &Registry) -> Result<(), PipelineError> {
        let io_err = |source| PipelineError::RegistryWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(registry)
            .map_err(|e| PipelineError::Other(anyhow::anyhow!("Failed to serialize registry: {e}")))?;

        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(path = %self.path.display(), files = registry.len(), "Registry saved");
        Ok(())
    }

    /// Load, apply `f`, save. One call is one logical step.
    pub fn update<F, R>(&self, f: F) -> Result<R, PipelineError>
    where
        F: FnOnce(&mut Registry) -> R,
    {
        let mut registry = self.load();
        let result = f(&mut registry);
        self.save(&registry)?;
        Ok(result)
    }

    /// Remove the persisted registry if present.
    pub fn clear(&self) -> std::io::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "registry".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;
    use crate::registry::{FileRecord, FileType};
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> RegistryStore {
        RegistryStore::new(dir.join("working").join("files.json"))
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempdir().unwrap();
        let registry = store_in(dir.path()).load();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_order_and_flags() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let mut registry = Registry::new();
        registry.insert("server.js", FileRecord::new(FileType::Backend, "entry"));
        registry.insert("package.json", FileRecord::new(FileType::Config, "manifest"));
        registry.get_mut("server.js").unwrap().complete(Phase::PseudoGen);
        store.save(&registry).unwrap();

        let loaded = store.load();
        assert_eq!(loaded, registry);
        let paths: Vec<&str> = loaded.paths().collect();
        assert_eq!(paths, vec!["server.js", "package.json"]);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.save(&Registry::new()).unwrap();
        assert!(store.path().exists());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_update_persists_mutation() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let inserted = store
            .update(|r| r.insert("a.js", FileRecord::new(FileType::Frontend, "a")))
            .unwrap();
        assert!(inserted);
        store
            .update(|r| r.get_mut("a.js").map(|rec| rec.complete(Phase::PseudoGen)))
            .unwrap();
        assert!(store.load().get("a.js").unwrap().is_done(Phase::PseudoGen));
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.save(&Registry::new()).unwrap();
        store.clear().unwrap();
        assert!(!store.exists());
        store.clear().unwrap();
    }
}
