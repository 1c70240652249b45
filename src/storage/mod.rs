//! Artifact storage for pseudocode and generated source.
//!
//! The pipeline only talks to an [`ArtifactStore`]; the filesystem layout is
//! an implementation detail of [`FsArtifactStore`]:
//!
//! ```text
//! <pseudo_dir>/<path>.pseudo   pseudocode artifacts
//! <output_dir>/<path>          generated source files
//! ```

pub mod collect;
pub mod memory;

pub use collect::{OutputManifest, collect_outputs, structure_warnings, write_manifest};
pub use memory::MemoryArtifactStore;

use crate::errors::StorageError;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Suffix appended to pseudocode artifact files.
pub const PSEUDO_SUFFIX: &str = ".pseudo";

/// The two artifact families a file produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    Pseudocode,
    Code,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Pseudocode => write!(f, "pseudocode"),
            ArtifactKind::Code => write!(f, "code"),
        }
    }
}

/// Read/write access to per-file artifacts, keyed by registry path.
pub trait ArtifactStore: Send + Sync {
    fn read(&self, kind: ArtifactKind, path: &str) -> Result<String, StorageError>;

    fn write(&self, kind: ArtifactKind, path: &str, content: &str) -> Result<(), StorageError>;

    /// Registry paths with a stored artifact of `kind`, sorted.
    fn list(&self, kind: ArtifactKind) -> Result<Vec<String>, StorageError>;

    /// Read an artifact, treating a missing or blank one as absent.
    fn read_non_empty(&self, kind: ArtifactKind, path: &str) -> Result<Option<String>, StorageError> {
        match self.read(kind, path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Reject absolute paths and parent-directory components.
pub fn check_relative(path: &str) -> Result<&Path, StorageError> {
    let candidate = Path::new(path);
    let safe = !path.trim().is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(candidate)
    } else {
        Err(StorageError::InvalidPath {
            path: path.to_string(),
        })
    }
}

/// Filesystem-backed store.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    pseudo_dir: PathBuf,
    output_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(pseudo_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            pseudo_dir: pseudo_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn root(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Pseudocode => &self.pseudo_dir,
            ArtifactKind::Code => &self.output_dir,
        }
    }

    /// On-disk location of an artifact.
    pub fn location(&self, kind: ArtifactKind, path: &str) -> Result<PathBuf, StorageError> {
        let relative = check_relative(path)?;
        Ok(match kind {
            ArtifactKind::Pseudocode => self.pseudo_dir.join(format!("{path}{PSEUDO_SUFFIX}")),
            ArtifactKind::Code => self.output_dir.join(relative),
        })
    }
}

impl ArtifactStore for FsArtifactStore {
    fn read(&self, kind: ArtifactKind, path: &str) -> Result<String, StorageError> {
        let location = self.location(kind, path)?;
        fs::read_to_string(&location).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    path: path.to_string(),
                }
            } else {
                StorageError::Io {
                    path: location,
                    source,
                }
            }
        })
    }

    fn write(&self, kind: ArtifactKind, path: &str, content: &str) -> Result<(), StorageError> {
        let location = self.location(kind, path)?;
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&location, content).map_err(|source| StorageError::Io {
            path: location,
            source,
        })
    }

    fn list(&self, kind: ArtifactKind) -> Result<Vec<String>, StorageError> {
        let root = self.root(kind);
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| StorageError::Io {
                path: root.to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(relative) = relative_slash_path(root, entry.path()) else {
                continue;
            };
            match kind {
                ArtifactKind::Pseudocode => {
                    if let Some(path) = relative.strip_suffix(PSEUDO_SUFFIX) {
                        paths.push(path.to_string());
                    }
                }
                ArtifactKind::Code => paths.push(relative),
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// `path` relative to `root` with forward slashes.
pub(crate) fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}
