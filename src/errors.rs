//! Typed error hierarchy for the generation pipeline.
//!
//! Three enums cover the three seams:
//! - `AgentError`: failures talking to the LLM agent collaborator
//! - `StorageError`: artifact reads and writes
//! - `PipelineError`: run-level failures that stop the pipeline
//!
//! Per-file exhaustion is *not* an error: it is reported as a
//! [`FileOutcome`](crate::executor::FileOutcome) so sibling files keep going.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from an agent invocation. All of these are treated as transient
/// by the retry controller.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to spawn agent process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Agent exited with non-zero code {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    #[error("Agent returned an empty response")]
    EmptyResponse,

    #[error("Agent I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the artifact store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Artifact not found: {path}")]
    NotFound { path: String },

    #[error("Refusing artifact path outside the store: {path}")]
    InvalidPath { path: String },

    #[error("Artifact I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Fatal errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid application description: {0}")]
    InvalidDescription(String),

    #[error("Planning agent failed: {0}")]
    Planning(#[source] AgentError),

    #[error("Plan validation failed after {attempts} attempts: {last_error}")]
    PlanValidationExhausted { attempts: u32, last_error: String },

    #[error("Pseudocode sanity check failed: {0}")]
    SanityCheckFailed(String),

    #[error("Failed to persist file registry at {path}: {source}")]
    RegistryWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot resume: {0}")]
    NothingToResume(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_error_spawn_failed_carries_command() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "claude not found");
        let err = AgentError::SpawnFailed {
            command: "claude".to_string(),
            source: io_err,
        };
        match &err {
            AgentError::SpawnFailed { command, source } => {
                assert_eq!(command, "claude");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected SpawnFailed variant"),
        }
        assert!(err.to_string().contains("claude"));
    }

    #[test]
    fn storage_error_not_found_is_detectable() {
        let err = StorageError::NotFound {
            path: "src/App.js".to_string(),
        };
        assert!(err.is_not_found());
        let err = StorageError::InvalidPath {
            path: "../etc/passwd".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn pipeline_error_plan_exhausted_carries_attempts() {
        let err = PipelineError::PlanValidationExhausted {
            attempts: 3,
            last_error: "no server entry".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains("no server entry"));
    }

    #[test]
    fn pipeline_error_converts_from_storage_error() {
        let inner = StorageError::NotFound {
            path: "a.js".to_string(),
        };
        let err: PipelineError = inner.into();
        assert!(matches!(
            err,
            PipelineError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&AgentError::EmptyResponse);
        assert_std_error(&StorageError::NotFound {
            path: "x".into(),
        });
        assert_std_error(&PipelineError::SanityCheckFailed("x".into()));
    }
}
