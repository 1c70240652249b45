//! Checks applied to the description and the parsed plan before any file
//! generation starts.

use crate::errors::PipelineError;
use crate::registry::{MANIFEST_PATH, Registry, SERVER_ENTRY_NAMES};

/// Descriptions shorter than this are rejected.
pub const MIN_DESCRIPTION_CHARS: usize = 20;

/// Descriptions longer than this only produce a warning.
pub const LONG_DESCRIPTION_CHARS: usize = 5000;

/// Why a plan was rejected. The message is fed back to the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanIssue {
    NoFiles,
    MissingManifest,
    MissingServerEntry,
}

impl std::fmt::Display for PlanIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanIssue::NoFiles => write!(f, "the plan lists no files"),
            PlanIssue::MissingManifest => {
                write!(f, "the plan is missing the {MANIFEST_PATH} manifest")
            }
            PlanIssue::MissingServerEntry => write!(
                f,
                "the plan has no server entry point (one of {})",
                SERVER_ENTRY_NAMES.join(", ")
            ),
        }
    }
}

/// Structural check of a freshly parsed plan.
pub fn validate_plan(registry: &Registry) -> Result<(), PlanIssue> {
    if registry.is_empty() {
        return Err(PlanIssue::NoFiles);
    }
    if !registry.has_manifest() {
        return Err(PlanIssue::MissingManifest);
    }
    if !registry.has_server_entry() {
        return Err(PlanIssue::MissingServerEntry);
    }
    Ok(())
}

/// Reject unusable descriptions. Returns warnings for usable-but-odd ones.
pub fn validate_description(description: &str) -> Result<Vec<String>, PipelineError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidDescription(
            "description is empty".to_string(),
        ));
    }
    let chars = trimmed.chars().count();
    if chars < MIN_DESCRIPTION_CHARS {
        return Err(PipelineError::InvalidDescription(format!(
            "description is {chars} characters, at least {MIN_DESCRIPTION_CHARS} are needed"
        )));
    }
    let mut warnings = Vec::new();
    if chars > LONG_DESCRIPTION_CHARS {
        warnings.push(format!(
            "description is {chars} characters; very long descriptions tend to produce unfocused plans"
        ));
    }
    Ok(warnings)
}
