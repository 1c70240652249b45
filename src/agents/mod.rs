//! The LLM agent collaborator.
//!
//! The pipeline never produces content itself; it hands context to an
//! [`Agent`] and judges what comes back. Every method returns the agent's
//! raw text. Parsing and acceptance live with the caller, so a scripted
//! agent in tests exercises exactly the same paths as the real one.

pub mod command;
pub mod prompts;

pub use command::CommandAgent;

use crate::errors::AgentError;
use crate::registry::FileType;
use async_trait::async_trait;

/// Everything an agent needs to write one file's pseudocode or code.
#[derive(Debug, Clone)]
pub struct FileContext<'a> {
    pub path: &'a str,
    pub file_type: FileType,
    pub description: &'a str,
    pub plan: &'a str,
    /// The verified pseudocode, present for code generation
    pub pseudocode: Option<&'a str>,
    /// Other project files grouped by type
    pub project_context: &'a str,
    /// Extracted package list, only supplied for the manifest file
    pub packages: Option<&'a str>,
}

/// One pseudocode batch under review.
#[derive(Debug, Clone)]
pub struct BatchReviewContext<'a> {
    pub plan: &'a str,
    pub dependency_summary: &'a str,
    /// `(path, pseudocode)` pairs
    pub files: Vec<(&'a str, &'a str)>,
}

/// One generated file under review against its pseudocode.
#[derive(Debug, Clone)]
pub struct CodeReviewContext<'a> {
    pub path: &'a str,
    pub description: &'a str,
    pub pseudocode: &'a str,
    pub code: &'a str,
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// Produce a free-text plan for the application.
    async fn plan(&self, description: &str) -> Result<String, AgentError>;

    /// Produce a new plan that addresses `feedback` about `previous`.
    async fn regenerate_plan(
        &self,
        description: &str,
        previous: &str,
        feedback: &str,
    ) -> Result<String, AgentError>;

    /// List the npm packages the plan needs, as JSON.
    async fn extract_packages(&self, plan: &str) -> Result<String, AgentError>;

    async fn generate_pseudocode(
        &self,
        ctx: &FileContext<'_>,
        feedback: Option<&str>,
    ) -> Result<String, AgentError>;

    /// Review a batch of pseudocode; answers `{path: {pass, issues}}` JSON.
    async fn verify_pseudocode_batch(
        &self,
        ctx: &BatchReviewContext<'_>,
    ) -> Result<String, AgentError>;

    async fn generate_code(
        &self,
        ctx: &FileContext<'_>,
        feedback: Option<&str>,
    ) -> Result<String, AgentError>;

    /// Review one file; answers with a PASS or FAIL verdict.
    async fn verify_code(&self, ctx: &CodeReviewContext<'_>) -> Result<String, AgentError>;

    /// Whole-project consistency check over the pseudocode file list.
    async fn sanity_check(&self, plan: &str, file_list: &str) -> Result<String, AgentError>;
}
