//! Run reports: what one pipeline run attempted and how it ended.
//!
//! Each run is written to `.stackforge/runs/<started>_<id8>.json`.

use crate::orchestrator::RunStage;
use crate::phase::Phase;
use crate::registry::StatusSummary;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A file that ran out of attempts in some phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub phase: Phase,
    pub pass: u32,
    pub attempts: u32,
    pub reason: String,
}

/// A file sent back to pseudocode after repeated verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub path: String,
    pub pass: u32,
    pub reason: String,
}

/// A verification batch that never produced a usable verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedBatch {
    pub pass: u32,
    pub files: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// First 12 hex characters of the description's SHA-256
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_hash: Option<String>,
    pub resumed: bool,
    pub stage: RunStage,
    pub passes: u32,
    #[serde(default)]
    pub failures: Vec<FileFailure>,
    #[serde(default)]
    pub escalations: Vec<Escalation>,
    #[serde(default)]
    pub unresolved_batches: Vec<UnresolvedBatch>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub status: StatusSummary,
    pub output_files: usize,
    /// Fatal error that ended the run, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(description: Option<&str>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            description_hash: description.map(description_hash),
            resumed: description.is_none(),
            stage: RunStage::Planning,
            passes: 0,
            failures: Vec::new(),
            escalations: Vec::new(),
            unresolved_batches: Vec::new(),
            warnings: Vec::new(),
            status: StatusSummary::default(),
            output_files: 0,
            error: None,
        }
    }

    pub fn record_failure(&mut self, path: &str, phase: Phase, attempts: u32, reason: &str) {
        self.failures.push(FileFailure {
            path: path.to_string(),
            phase,
            pass: self.passes,
            attempts,
            reason: reason.to_string(),
        });
    }

    pub fn record_escalation(&mut self, path: &str, reason: &str) {
        self.escalations.push(Escalation {
            path: path.to_string(),
            pass: self.passes,
            reason: reason.to_string(),
        });
    }

    pub fn record_unresolved(&mut self, files: Vec<String>, reason: &str) {
        self.unresolved_batches.push(UnresolvedBatch {
            pass: self.passes,
            files,
            reason: reason.to_string(),
        });
    }

    pub fn finish(&mut self, status: StatusSummary) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    /// Every file verified with nothing left unresolved.
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.status.is_complete()
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.json",
            self.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &self.run_id.to_string()[..8]
        )
    }

    /// Write the report into `runs_dir`, returning its path.
    pub fn save(&self, runs_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(runs_dir).context("Failed to create runs directory")?;
        let path = runs_dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        fs::write(&path, json).context("Failed to write run report")?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read run report")?;
        serde_json::from_str(&content).context("Failed to parse run report")
    }
}

/// Report files in `runs_dir`, most recent first.
pub fn list_runs(runs_dir: &Path) -> Result<Vec<PathBuf>> {
    if !runs_dir.exists() {
        return Ok(Vec::new());
    }
    let mut runs: Vec<PathBuf> = fs::read_dir(runs_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "json"))
        .collect();
    runs.sort();
    runs.reverse();
    Ok(runs)
}

pub fn description_hash(description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(description.trim().as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_description_hash_is_stable_and_short() {
        let a = description_hash("A todo app with user accounts");
        let b = description_hash("  A todo app with user accounts\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert_ne!(a, description_hash("A chat app"));
    }

    #[test]
    fn test_new_report_without_description_is_a_resume() {
        let report = RunReport::new(None);
        assert!(report.resumed);
        assert!(report.description_hash.is_none());
        assert!(!RunReport::new(Some("desc")).resumed);
    }

    #[test]
    fn test_records_carry_current_pass() {
        let mut report = RunReport::new(Some("desc"));
        report.passes = 2;
        report.record_failure("a.js", Phase::CodeGen, 3, "too short");
        report.record_escalation("b.js", "still failing");
        report.record_unresolved(vec!["c.js".to_string()], "no verdict");
        assert_eq!(report.failures[0].pass, 2);
        assert_eq!(report.escalations[0].pass, 2);
        assert_eq!(report.unresolved_batches[0].files, vec!["c.js"]);
    }

    #[test]
    fn test_save_load_and_list() {
        let dir = TempDir::new().unwrap();
        let runs = dir.path().join("runs");
        let mut report = RunReport::new(Some("desc"));
        report.stage = RunStage::Done;
        report.finish(StatusSummary {
            total: 1,
            code_verified: 1,
            ..Default::default()
        });
        let path = report.save(&runs).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().ends_with(".json"));

        let loaded = RunReport::load(&path).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.stage, RunStage::Done);
        assert!(loaded.succeeded());

        assert_eq!(list_runs(&runs).unwrap(), vec![path]);
        assert!(list_runs(&dir.path().join("missing")).unwrap().is_empty());
    }
}
