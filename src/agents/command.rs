//! Agent backed by an external CLI (by default `claude --print`).
//!
//! Each call spawns the command, writes the prompt on stdin and returns
//! stdout. Calls are sequential; there is no timeout.

use super::{Agent, BatchReviewContext, CodeReviewContext, FileContext, prompts};
use crate::errors::AgentError;
use crate::settings::AgentSection;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Which model a call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    /// Planning, pseudocode and pseudocode review
    Reasoning,
    /// Source generation and code review
    Coding,
}

#[derive(Debug, Clone)]
pub struct CommandAgent {
    command: String,
    args: Vec<String>,
    reasoning_model: Option<String>,
    coding_model: Option<String>,
    working_dir: PathBuf,
}

impl CommandAgent {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: vec!["--print".to_string()],
            reasoning_model: None,
            coding_model: None,
            working_dir: working_dir.into(),
        }
    }

    /// Build from the `[agent]` config section.
    pub fn from_section(command: String, section: &AgentSection, working_dir: PathBuf) -> Self {
        Self {
            command,
            args: section.args.clone(),
            reasoning_model: section.reasoning_model.clone(),
            coding_model: section.coding_model.clone(),
            working_dir,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Full argument list for a call in `role`.
    pub fn args_for(&self, role: ModelRole) -> Vec<String> {
        let mut args = self.args.clone();
        let model = match role {
            ModelRole::Reasoning => &self.reasoning_model,
            ModelRole::Coding => &self.coding_model,
        };
        if let Some(model) = model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args
    }

    async fn invoke(&self, role: ModelRole, prompt: String) -> Result<String, AgentError> {
        let args = self.args_for(role);
        debug!(command = %self.command, ?args, chars = prompt.len(), "Invoking agent");
        let start = Instant::now();

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(&self.working_dir)
            .spawn()
            .map_err(|source| AgentError::SpawnFailed {
                command: self.command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            status = ?output.status.code(),
            "Agent finished"
        );

        if !output.status.success() {
            return Err(AgentError::NonZeroExit {
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(AgentError::EmptyResponse);
        }
        Ok(stdout)
    }
}

#[async_trait]
impl Agent for CommandAgent {
    async fn plan(&self, description: &str) -> Result<String, AgentError> {
        self.invoke(ModelRole::Reasoning, prompts::plan(description))
            .await
    }

    async fn regenerate_plan(
        &self,
        description: &str,
        previous: &str,
        feedback: &str,
    ) -> Result<String, AgentError> {
        self.invoke(
            ModelRole::Reasoning,
            prompts::regenerate_plan(description, previous, feedback),
        )
        .await
    }

    async fn extract_packages(&self, plan: &str) -> Result<String, AgentError> {
        self.invoke(ModelRole::Reasoning, prompts::packages(plan)).await
    }

    async fn generate_pseudocode(
        &self,
        ctx: &FileContext<'_>,
        feedback: Option<&str>,
    ) -> Result<String, AgentError> {
        self.invoke(ModelRole::Reasoning, prompts::pseudocode(ctx, feedback))
            .await
    }

    async fn verify_pseudocode_batch(
        &self,
        ctx: &BatchReviewContext<'_>,
    ) -> Result<String, AgentError> {
        self.invoke(ModelRole::Reasoning, prompts::batch_review(ctx))
            .await
    }

    async fn generate_code(
        &self,
        ctx: &FileContext<'_>,
        feedback: Option<&str>,
    ) -> Result<String, AgentError> {
        self.invoke(ModelRole::Coding, prompts::code(ctx, feedback))
            .await
    }

    async fn verify_code(&self, ctx: &CodeReviewContext<'_>) -> Result<String, AgentError> {
        self.invoke(ModelRole::Coding, prompts::code_review(ctx))
            .await
    }

    async fn sanity_check(&self, plan: &str, file_list: &str) -> Result<String, AgentError> {
        self.invoke(ModelRole::Reasoning, prompts::sanity_check(plan, file_list))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_args_for_adds_model_per_role() {
        let section = AgentSection {
            command: None,
            args: vec!["--print".to_string()],
            reasoning_model: Some("opus".to_string()),
            coding_model: None,
        };
        let agent = CommandAgent::from_section("claude".to_string(), &section, PathBuf::from("."));
        assert_eq!(
            agent.args_for(ModelRole::Reasoning),
            vec!["--print", "--model", "opus"]
        );
        assert_eq!(agent.args_for(ModelRole::Coding), vec!["--print"]);
    }

    #[tokio::test]
    async fn test_invoke_returns_stdout() {
        let dir = tempdir().unwrap();
        // `cat` echoes the prompt back.
        let agent = CommandAgent::new("cat", dir.path()).with_args(Vec::new());
        let out = agent.plan("A todo app with accounts").await.unwrap();
        assert!(out.contains("A todo app with accounts"));
    }

    #[tokio::test]
    async fn test_invoke_missing_command_is_spawn_failure() {
        let dir = tempdir().unwrap();
        let agent = CommandAgent::new("definitely-not-an-agent-binary", dir.path());
        let err = agent.plan("x").await.unwrap_err();
        assert!(matches!(err, AgentError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_invoke_non_zero_exit() {
        let dir = tempdir().unwrap();
        let agent = CommandAgent::new("false", dir.path()).with_args(Vec::new());
        let err = agent.plan("x").await.unwrap_err();
        assert!(matches!(err, AgentError::NonZeroExit { .. }));
    }
}
