//! The file registry: one record per project file, tracking phase progress.
//!
//! The registry is the pipeline's single source of truth and its checkpoint.
//! It is persisted as:
//!
//! ```json
//! {
//!   "files": {
//!     "src/App.js": {
//!       "type": "frontend",
//!       "description": "Root component",
//!       "is_pseudo_gen": true,
//!       "is_pseudo_ver": false,
//!       "is_code_gen": false,
//!       "is_code_ver": false,
//!       "needs_review": false
//!     }
//!   }
//! }
//! ```
//!
//! Insertion order is preserved; it breaks ties when ordering batches.

pub mod store;

pub use store::RegistryStore;

use crate::phase::Phase;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Path of the configuration manifest every project needs.
pub const MANIFEST_PATH: &str = "package.json";

/// Path injected when the plan has no server entry.
pub const SERVER_ENTRY_PATH: &str = "server.js";

/// File names accepted as a server entry point.
pub const SERVER_ENTRY_NAMES: [&str; 3] = ["server.js", "index.js", "app.js"];

/// Coarse category of a project file, used for type-based batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum FileType {
    Frontend,
    Backend,
    Config,
    Other,
}

impl FileType {
    /// Batching order for type-based scheduling.
    pub const BATCH_ORDER: [FileType; 4] = [
        FileType::Frontend,
        FileType::Backend,
        FileType::Config,
        FileType::Other,
    ];

    /// Map a planner-supplied label onto a canonical type.
    ///
    /// `documentation` folds into config and `styles` into frontend.
    /// Returns `None` for labels with no canonical counterpart.
    pub fn from_label(label: &str) -> Option<FileType> {
        match label.trim().to_lowercase().as_str() {
            "frontend" | "styles" => Some(FileType::Frontend),
            "backend" => Some(FileType::Backend),
            "config" | "documentation" => Some(FileType::Config),
            "other" => Some(FileType::Other),
            _ => None,
        }
    }

    /// Guess a type from the path alone.
    pub fn classify(path: &str) -> FileType {
        let lower = path.to_lowercase();
        let name = lower.rsplit('/').next().unwrap_or(&lower);

        if matches!(name, "package.json" | ".env" | ".gitignore" | "readme.md") {
            FileType::Config
        } else if lower.contains("src/")
            || lower.contains("components/")
            || ([".js", ".jsx", ".css"].iter().any(|ext| name.ends_with(ext))
                && !is_backend_path(&lower))
        {
            FileType::Frontend
        } else if is_backend_path(&lower) {
            FileType::Backend
        } else {
            FileType::Other
        }
    }

    /// Canonical type from an optional label, falling back to the path.
    pub fn resolve(label: Option<&str>, path: &str) -> FileType {
        label
            .and_then(FileType::from_label)
            .unwrap_or_else(|| FileType::classify(path))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Frontend => "frontend",
            FileType::Backend => "backend",
            FileType::Config => "config",
            FileType::Other => "other",
        }
    }
}

fn is_backend_path(lower: &str) -> bool {
    lower.contains("models/") || lower.contains("routes/") || lower.ends_with("server.js")
}

impl From<String> for FileType {
    fn from(label: String) -> Self {
        FileType::from_label(&label).unwrap_or(FileType::Other)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress and metadata for one project file.
///
/// Phase flags are private: they only change through [`complete`](Self::complete),
/// [`reset`](Self::reset) and [`escalate`](Self::escalate), which keep the
/// ordering `code_verify ⇒ code_gen ⇒ pseudo_verify ⇒ pseudo_gen`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    is_pseudo_gen: bool,
    #[serde(default)]
    is_pseudo_ver: bool,
    #[serde(default)]
    is_code_gen: bool,
    #[serde(default)]
    is_code_ver: bool,
    /// Set when code verification exhausted its regeneration budget
    #[serde(default)]
    pub needs_review: bool,
    /// Latest verification failure text, fed back into the next generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,
}

impl FileRecord {
    pub fn new(file_type: FileType, description: impl Into<String>) -> Self {
        Self {
            file_type,
            description: description.into(),
            is_pseudo_gen: false,
            is_pseudo_ver: false,
            is_code_gen: false,
            is_code_ver: false,
            needs_review: false,
            review_reason: None,
        }
    }

    pub fn is_done(&self, phase: Phase) -> bool {
        match phase {
            Phase::PseudoGen => self.is_pseudo_gen,
            Phase::PseudoVerify => self.is_pseudo_ver,
            Phase::CodeGen => self.is_code_gen,
            Phase::CodeVerify => self.is_code_ver,
        }
    }

    fn flag_mut(&mut self, phase: Phase) -> &mut bool {
        match phase {
            Phase::PseudoGen => &mut self.is_pseudo_gen,
            Phase::PseudoVerify => &mut self.is_pseudo_ver,
            Phase::CodeGen => &mut self.is_code_gen,
            Phase::CodeVerify => &mut self.is_code_ver,
        }
    }

    /// Whether the phase before `phase` is complete.
    pub fn upstream_done(&self, phase: Phase) -> bool {
        phase.upstream().is_none_or(|up| self.is_done(up))
    }

    /// Mark `phase` complete. Refused (returns `false`) while its upstream
    /// phase is incomplete.
    pub fn complete(&mut self, phase: Phase) -> bool {
        if !self.upstream_done(phase) {
            return false;
        }
        *self.flag_mut(phase) = true;
        true
    }

    /// Clear `phase` and every phase after it.
    pub fn reset(&mut self, phase: Phase) {
        for p in phase.and_downstream() {
            *self.flag_mut(p) = false;
        }
    }

    /// Send the file back to pseudocode generation and flag it for review.
    pub fn escalate(&mut self, reason: impl Into<String>) {
        self.reset(Phase::PseudoGen);
        self.needs_review = true;
        self.review_reason = Some(reason.into());
    }

    /// Record verification feedback without escalating.
    pub fn record_issues(&mut self, issues: impl Into<String>) {
        self.review_reason = Some(issues.into());
    }

    pub fn clear_review(&mut self) {
        self.needs_review = false;
        self.review_reason = None;
    }

    /// Number of leading phases complete.
    pub fn phases_done(&self) -> usize {
        Phase::ALL.iter().take_while(|p| self.is_done(**p)).count()
    }

    /// Clear any flag set above an incomplete phase. Returns whether anything changed.
    fn normalize(&mut self) -> bool {
        let done = self.phases_done();
        let mut changed = false;
        for phase in Phase::ALL.into_iter().skip(done) {
            if self.is_done(phase) {
                *self.flag_mut(phase) = false;
                changed = true;
            }
        }
        changed
    }
}

/// A snapshot of one registry entry, handed to executors and the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFile {
    pub path: String,
    pub record: FileRecord,
}

impl TrackedFile {
    pub fn new(path: impl Into<String>, record: FileRecord) -> Self {
        Self {
            path: path.into(),
            record,
        }
    }

    pub fn file_type(&self) -> FileType {
        self.record.file_type
    }
}

/// Per-phase completion counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub pseudo_generated: usize,
    pub pseudo_verified: usize,
    pub code_generated: usize,
    pub code_verified: usize,
    pub needs_review: usize,
}

impl StatusSummary {
    pub fn count(&self, phase: Phase) -> usize {
        match phase {
            Phase::PseudoGen => self.pseudo_generated,
            Phase::PseudoVerify => self.pseudo_verified,
            Phase::CodeGen => self.code_generated,
            Phase::CodeVerify => self.code_verified,
        }
    }

    /// Every file has passed code verification.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.code_verified == self.total
    }
}

/// The full set of tracked files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub files: IndexMap<String, FileRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut FileRecord> {
        self.files.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Insert a record unless the path is already tracked. Returns whether it was inserted.
    pub fn insert(&mut self, path: impl Into<String>, record: FileRecord) -> bool {
        let path = path.into();
        if self.files.contains_key(&path) {
            return false;
        }
        self.files.insert(path, record);
        true
    }

    /// Paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn tracked(&self) -> Vec<TrackedFile> {
        self.files
            .iter()
            .map(|(path, record)| TrackedFile::new(path.clone(), record.clone()))
            .collect()
    }

    /// Files whose `phase` flag is false, in insertion order.
    pub fn unfinished(&self, phase: Phase) -> Vec<TrackedFile> {
        self.files
            .iter()
            .filter(|(_, record)| !record.is_done(phase))
            .map(|(path, record)| TrackedFile::new(path.clone(), record.clone()))
            .collect()
    }

    /// Unfinished files whose upstream phase is complete.
    pub fn ready(&self, phase: Phase) -> Vec<TrackedFile> {
        self.files
            .iter()
            .filter(|(_, record)| !record.is_done(phase) && record.upstream_done(phase))
            .map(|(path, record)| TrackedFile::new(path.clone(), record.clone()))
            .collect()
    }

    /// A phase is complete when no file has it unfinished.
    pub fn is_phase_complete(&self, phase: Phase) -> bool {
        self.files.values().all(|record| record.is_done(phase))
    }

    /// Files escalated by code verification.
    pub fn needs_review(&self) -> Vec<TrackedFile> {
        self.files
            .iter()
            .filter(|(_, record)| record.needs_review)
            .map(|(path, record)| TrackedFile::new(path.clone(), record.clone()))
            .collect()
    }

    pub fn has_manifest(&self) -> bool {
        self.paths().any(|p| file_name(p) == MANIFEST_PATH)
    }

    pub fn has_server_entry(&self) -> bool {
        self.paths()
            .any(|p| SERVER_ENTRY_NAMES.contains(&file_name(p)))
    }

    /// Inject a manifest and a server entry when missing. Returns the injected paths.
    pub fn ensure_minimum_viable_set(&mut self) -> Vec<String> {
        let mut injected = Vec::new();
        if !self.has_manifest() {
            self.insert(
                MANIFEST_PATH,
                FileRecord::new(
                    FileType::Config,
                    "Project manifest with dependencies and scripts",
                ),
            );
            injected.push(MANIFEST_PATH.to_string());
        }
        if !self.has_server_entry() {
            self.insert(
                SERVER_ENTRY_PATH,
                FileRecord::new(FileType::Backend, "Main server entry point"),
            );
            injected.push(SERVER_ENTRY_PATH.to_string());
        }
        injected
    }

    pub fn status(&self) -> StatusSummary {
        let mut summary = StatusSummary {
            total: self.files.len(),
            ..Default::default()
        };
        for record in self.files.values() {
            summary.pseudo_generated += usize::from(record.is_done(Phase::PseudoGen));
            summary.pseudo_verified += usize::from(record.is_done(Phase::PseudoVerify));
            summary.code_generated += usize::from(record.is_done(Phase::CodeGen));
            summary.code_verified += usize::from(record.is_done(Phase::CodeVerify));
            summary.needs_review += usize::from(record.needs_review);
        }
        summary
    }

    /// Repair records whose flags break phase ordering. Returns the repaired paths.
    pub fn normalize(&mut self) -> Vec<String> {
        self.files
            .iter_mut()
            .filter_map(|(path, record)| record.normalize().then(|| path.clone()))
            .collect()
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
