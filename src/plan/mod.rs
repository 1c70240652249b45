//! Turning the planner's free-text plan into a file list.
//!
//! Extraction tries, in order:
//! 1. an embedded JSON object with a `files` array,
//! 2. a "File Structure" style markdown section with `- path: description` lines,
//! 3. a hardcoded minimal file set.
//!
//! Paths are sanitized on the way in, so the registry only ever holds
//! relative, forward-slash paths.

pub mod validate;

pub use validate::{PlanIssue, validate_description, validate_plan};

use crate::extract::{Extraction, json_object_spans};
use crate::registry::{FileRecord, FileType, MANIFEST_PATH, Registry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Headings that introduce a file listing, compared case-insensitively.
const STRUCTURE_HEADINGS: [&str; 4] = [
    "complete file structure",
    "file structure",
    "project structure",
    "files structure",
];

/// Characters stripped from planner-supplied paths.
const STRIPPED_PATH_CHARS: [char; 8] = ['<', '>', ':', '|', '"', '?', '*', '`'];

/// One file the plan asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedFile {
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub description: String,
}

impl PlannedFile {
    pub fn new(path: impl Into<String>, file_type: FileType, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_type,
            description: description.into(),
        }
    }
}

/// Which extraction strategy produced the file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Json,
    StructureSection,
    MinimalSet,
}

impl std::fmt::Display for PlanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanSource::Json => write!(f, "JSON file list"),
            PlanSource::StructureSection => write!(f, "file structure section"),
            PlanSource::MinimalSet => write!(f, "minimal file set"),
        }
    }
}

/// Clean a planner path. Returns `None` when nothing safe remains.
pub fn sanitize_path(raw: &str) -> Option<String> {
    if raw.contains('&') {
        return None;
    }
    let cleaned: String = raw
        .replace("**", "")
        .replace('\\', "/")
        .chars()
        .filter(|c| !STRIPPED_PATH_CHARS.contains(c))
        .collect();
    let mut path = cleaned.trim();
    while let Some(rest) = path.strip_prefix("./").or_else(|| path.strip_prefix('/')) {
        path = rest;
    }
    let path = path.trim_end_matches('/');

    if path.is_empty()
        || path.chars().any(char::is_whitespace)
        || path.split('/').any(|seg| seg.is_empty() || seg == "..")
    {
        return None;
    }
    Some(path.to_string())
}

/// Pull the `files` array out of the first JSON object that has one.
pub fn extract_file_list(plan: &str) -> Extraction<Vec<PlannedFile>> {
    for span in json_object_spans(plan) {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(span) else {
            continue;
        };
        let Some(entries) = value.get("files").and_then(|f| f.as_array()) else {
            continue;
        };
        let files: Vec<PlannedFile> = entries.iter().filter_map(planned_from_json).collect();
        if files.is_empty() {
            debug!("JSON files array present but held no usable entries");
            continue;
        }
        return Extraction::Parsed(files);
    }
    Extraction::Fallback("no JSON object with a files array".to_string())
}

fn planned_from_json(entry: &serde_json::Value) -> Option<PlannedFile> {
    if let Some(raw) = entry.as_str() {
        let path = sanitize_path(raw)?;
        return Some(PlannedFile::new(path.clone(), FileType::classify(&path), ""));
    }
    let raw = ["path", "name", "file", "filename"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(|v| v.as_str()))?;
    let path = sanitize_path(raw)?;
    let label = entry.get("type").and_then(|v| v.as_str());
    let description = entry
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    Some(PlannedFile::new(
        path.clone(),
        FileType::resolve(label, &path),
        description,
    ))
}

/// Parse `- path: description` lines under a file-structure heading.
pub fn parse_structure_sections(plan: &str) -> Extraction<Vec<PlannedFile>> {
    let mut files = Vec::new();
    let mut in_section = false;
    let mut saw_heading = false;

    for line in plan.lines() {
        let trimmed = line.trim();
        if let Some(level) = heading_level(trimmed) {
            let title = trimmed.trim_start_matches('#').trim().to_lowercase();
            if STRUCTURE_HEADINGS.iter().any(|h| title == *h) {
                in_section = true;
                saw_heading = true;
                continue;
            }
            if level <= 2 {
                in_section = false;
            }
            continue;
        }
        if in_section && let Some(file) = parse_listing_line(trimmed) {
            files.push(file);
        }
    }

    if files.is_empty() {
        let reason = if saw_heading {
            "file structure section has no file lines"
        } else {
            "no file structure section"
        };
        Extraction::Fallback(reason.to_string())
    } else {
        Extraction::Parsed(files)
    }
}

fn heading_level(line: &str) -> Option<usize> {
    let level = line.chars().take_while(|c| *c == '#').count();
    (level > 0 && line[level..].starts_with(' ')).then_some(level)
}

fn parse_listing_line(line: &str) -> Option<PlannedFile> {
    let item = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line)
        .trim();
    let (raw_path, description) = match item.split_once(':') {
        Some((path, desc)) => (path, desc.trim()),
        None => match item.split_once(" - ") {
            Some((path, desc)) => (path, desc.trim()),
            None => (item, ""),
        },
    };
    let raw_path = raw_path.trim();
    if !looks_like_file(raw_path) {
        return None;
    }
    let path = sanitize_path(raw_path)?;
    Some(PlannedFile::new(
        path.clone(),
        FileType::classify(&path),
        description,
    ))
}

fn looks_like_file(raw: &str) -> bool {
    let raw = raw.trim_matches(|c| c == '`' || c == '*');
    raw.len() >= 2 && !raw.contains(' ') && (raw.contains('.') || raw.contains('/'))
}

/// The file set used when the plan yields nothing parsable.
pub fn minimal_file_set() -> Vec<PlannedFile> {
    vec![
        PlannedFile::new(
            MANIFEST_PATH,
            FileType::Config,
            "Project manifest with dependencies and scripts",
        ),
        PlannedFile::new("server.js", FileType::Backend, "Main server entry point"),
        PlannedFile::new("src/App.js", FileType::Frontend, "Root application component"),
        PlannedFile::new(".env", FileType::Config, "Environment variables"),
        PlannedFile::new("README.md", FileType::Config, "Project documentation"),
    ]
}

/// Extract a file list from the plan, falling back through every strategy.
pub fn files_from_plan(plan: &str) -> (Vec<PlannedFile>, PlanSource) {
    match extract_file_list(plan) {
        Extraction::Parsed(files) => return (dedup(files), PlanSource::Json),
        Extraction::Fallback(reason) => debug!(%reason, "JSON file list not found"),
    }
    match parse_structure_sections(plan) {
        Extraction::Parsed(files) => return (dedup(files), PlanSource::StructureSection),
        Extraction::Fallback(reason) => debug!(%reason, "File structure section not found"),
    }
    warn!("Plan contained no parsable file list, using the minimal file set");
    (minimal_file_set(), PlanSource::MinimalSet)
}

fn dedup(files: Vec<PlannedFile>) -> Vec<PlannedFile> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.path.clone()))
        .collect()
}

/// Build a fresh registry from planned files. Returns the injected paths too.
pub fn build_registry(files: &[PlannedFile], inject_minimum: bool) -> (Registry, Vec<String>) {
    let mut registry = Registry::new();
    for file in files {
        registry.insert(
            file.path.clone(),
            FileRecord::new(file.file_type, file.description.clone()),
        );
    }
    let injected = if inject_minimum {
        registry.ensure_minimum_viable_set()
    } else {
        Vec::new()
    };
    (registry, injected)
}

/// Parse the package list returned for a plan: either `{"dependencies": {...}}`
/// or a bare `{name: version}` object.
pub fn parse_package_list(text: &str) -> Extraction<BTreeMap<String, String>> {
    for span in json_object_spans(text) {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(span) else {
            continue;
        };
        let object = value
            .get("dependencies")
            .and_then(|d| d.as_object())
            .or_else(|| value.as_object());
        let Some(object) = object else { continue };
        let packages: BTreeMap<String, String> = object
            .iter()
            .filter_map(|(name, version)| {
                version.as_str().map(|v| (name.clone(), v.to_string()))
            })
            .collect();
        if !packages.is_empty() {
            return Extraction::Parsed(packages);
        }
    }
    Extraction::Fallback("no package object in response".to_string())
}
