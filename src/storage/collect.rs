//! Gathering the generated project once the code loop is done.

use super::relative_slash_path;
use crate::errors::StorageError;
use crate::registry::{MANIFEST_PATH, SERVER_ENTRY_NAMES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// File name of the manifest written at the output root.
pub const OUTPUT_MANIFEST: &str = "manifest.json";

/// Read every text file under `root` into a `{path: content}` map.
///
/// Non-UTF-8 files and the output manifest itself are skipped.
pub fn collect_outputs(root: &Path) -> Result<BTreeMap<String, String>, StorageError> {
    let mut outputs = BTreeMap::new();
    if !root.exists() {
        return Ok(outputs);
    }
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
        if relative == OUTPUT_MANIFEST {
            continue;
        }
        match fs::read_to_string(entry.path()) {
            Ok(content) => {
                outputs.insert(relative, content);
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(file = %relative, "Skipping non-text output file");
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: entry.path().to_path_buf(),
                    source,
                });
            }
        }
    }
    Ok(outputs)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub lines: usize,
    pub bytes: usize,
}

/// Summary of a generated project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputManifest {
    pub generated_at: DateTime<Utc>,
    pub total_files: usize,
    pub total_lines: usize,
    pub total_bytes: usize,
    pub files: Vec<ManifestEntry>,
}

impl OutputManifest {
    pub fn from_outputs(outputs: &BTreeMap<String, String>) -> Self {
        let files: Vec<ManifestEntry> = outputs
            .iter()
            .map(|(path, content)| ManifestEntry {
                path: path.clone(),
                lines: content.lines().count(),
                bytes: content.len(),
            })
            .collect();
        Self {
            generated_at: Utc::now(),
            total_files: files.len(),
            total_lines: files.iter().map(|f| f.lines).sum(),
            total_bytes: files.iter().map(|f| f.bytes).sum(),
            files,
        }
    }
}

/// Write `manifest.json` at the output root.
pub fn write_manifest(
    root: &Path,
    outputs: &BTreeMap<String, String>,
) -> Result<(OutputManifest, PathBuf), StorageError> {
    let manifest = OutputManifest::from_outputs(outputs);
    let path = root.join(OUTPUT_MANIFEST);
    let json = serde_json::to_string_pretty(&manifest).map_err(|e| StorageError::Io {
        path: path.clone(),
        source: e.into(),
    })?;
    fs::create_dir_all(root).map_err(|source| StorageError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    fs::write(&path, json).map_err(|source| StorageError::Io {
        path: path.clone(),
        source,
    })?;
    Ok((manifest, path))
}

/// Structural problems in a generated project, as warnings.
pub fn structure_warnings(outputs: &BTreeMap<String, String>) -> Vec<String> {
    let mut warnings = Vec::new();
    let name_of = |path: &str| path.rsplit('/').next().unwrap_or(path).to_string();

    match outputs.iter().find(|(path, _)| name_of(path) == MANIFEST_PATH) {
        None => warnings.push(format!("no {MANIFEST_PATH} was generated")),
        Some((path, content)) => {
            if serde_json::from_str::<serde_json::Value>(content).is_err() {
                warnings.push(format!("{path} is not valid JSON"));
            }
        }
    }
    if !outputs
        .keys()
        .any(|path| SERVER_ENTRY_NAMES.contains(&name_of(path).as_str()))
    {
        warnings.push("no server entry point was generated".to_string());
    }
    if !outputs.keys().any(|path| {
        let name = name_of(path);
        name == "App.js" || name == "App.jsx"
    }) {
        warnings.push("no App component was generated".to_string());
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn outputs(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    #[test]
    fn test_collect_outputs_walks_tree() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("server.js"), "app.listen(3000);").unwrap();
        fs::write(dir.path().join("src/App.js"), "export default App;").unwrap();
        fs::write(dir.path().join(OUTPUT_MANIFEST), "{}").unwrap();
        fs::write(dir.path().join("logo.png"), [0xff, 0xfe, 0x00, 0x81]).unwrap();

        let collected = collect_outputs(dir.path()).unwrap();
        let paths: Vec<&str> = collected.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["server.js", "src/App.js"]);
    }

    #[test]
    fn test_collect_outputs_missing_root() {
        let dir = tempdir().unwrap();
        assert!(collect_outputs(&dir.path().join("none")).unwrap().is_empty());
    }

    #[test]
    fn test_manifest_totals() {
        let dir = tempdir().unwrap();
        let files = outputs(&[("a.js", "one\ntwo\n"), ("b.js", "three")]);
        let (manifest, path) = write_manifest(dir.path(), &files).unwrap();
        assert_eq!(manifest.total_files, 2);
        assert_eq!(manifest.total_lines, 3);
        assert_eq!(manifest.total_bytes, 13);
        assert!(path.exists());
    }

    #[test]
    fn test_structure_warnings() {
        let good = outputs(&[
            ("package.json", "{\"name\": \"app\"}"),
            ("server.js", "x"),
            ("src/App.jsx", "x"),
        ]);
        assert!(structure_warnings(&good).is_empty());

        let bad = outputs(&[("package.json", "{ broken")]);
        let warnings = structure_warnings(&bad);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("not valid JSON"));
    }
}
