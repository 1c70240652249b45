//! Per-file and per-batch phase execution.
//!
//! A [`PhaseExecutor`] runs one phase for one file (or one verification
//! batch): it calls the agent, checks the answer, stores the artifact and
//! persists the registry change straight away. Budgets are enforced by the
//! machines in [`retry`].
//!
//! Running out of attempts is an outcome, not an error: the `Err` side of
//! every method is reserved for failures to persist the registry, which stop
//! the run.

pub mod acceptance;
pub mod retry;

pub use acceptance::{CodeVerdict, FileVerdict, parse_batch_verdict, parse_code_verdict};
pub use retry::{
    GenerationEvent, GenerationMachine, GenerationState, RetryBudget, VerificationEvent,
    VerificationMachine, VerificationState,
};

use crate::agents::{Agent, BatchReviewContext, CodeReviewContext, FileContext};
use crate::dag::Batch;
use crate::errors::PipelineError;
use crate::extract::Extraction;
use crate::phase::Phase;
use crate::registry::{FileType, MANIFEST_PATH, Registry, RegistryStore, TrackedFile};
use crate::settings::PipelineSettings;
use crate::storage::{ArtifactKind, ArtifactStore};
use tracing::{debug, info, warn};

/// How one file fared in one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Completed { attempts: u32 },
    Failed { attempts: u32, reason: String },
    /// Verification kept failing; the file was sent back to pseudocode
    Escalated { reason: String },
}

impl FileOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, FileOutcome::Completed { .. })
    }
}

/// Result of verifying one pseudocode batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub passed: Vec<String>,
    /// `(path, issues)` for files the verifier rejected
    pub failed: Vec<(String, String)>,
    /// Files dropped because their pseudocode was missing or empty
    pub missing: Vec<String>,
    /// Files the verdict did not mention
    pub unverdicted: Vec<String>,
    /// Passed files whose `pseudo_gen` was reset before the pass could be recorded
    pub refused: Vec<String>,
    /// Set when no usable verdict was obtained within the retry budget
    pub unresolved: Option<String>,
}

/// Shared run inputs every generation prompt carries.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunInputs<'a> {
    pub plan: &'a str,
    /// Package list handed to the manifest's code generation
    pub packages: Option<&'a str>,
    /// Other project files grouped by type
    pub project_context: &'a str,
}

pub struct PhaseExecutor<'a> {
    agent: &'a dyn Agent,
    store: &'a dyn ArtifactStore,
    registry: &'a RegistryStore,
    settings: &'a PipelineSettings,
}

impl<'a> PhaseExecutor<'a> {
    pub fn new(
        agent: &'a dyn Agent,
        store: &'a dyn ArtifactStore,
        registry: &'a RegistryStore,
        settings: &'a PipelineSettings,
    ) -> Self {
        Self {
            agent,
            store,
            registry,
            settings,
        }
    }

    fn budget(&self) -> RetryBudget {
        RetryBudget::from_settings(self.settings)
    }

    /// Generate and store pseudocode for `file`, completing `pseudo_gen`.
    ///
    /// Any feedback stored on the record seeds the first attempt; a success
    /// clears it along with the review flag.
    pub async fn generate_pseudocode(
        &self,
        file: &TrackedFile,
        inputs: RunInputs<'_>,
    ) -> Result<FileOutcome, PipelineError> {
        let mut machine =
            GenerationMachine::new(self.budget()).with_feedback(file.record.review_reason.clone());
        let ctx = FileContext {
            path: &file.path,
            file_type: file.file_type(),
            description: &file.record.description,
            plan: inputs.plan,
            pseudocode: None,
            project_context: inputs.project_context,
            packages: None,
        };

        while machine.is_attempting() {
            let attempt = machine.attempts() + 1;
            debug!(file = %file.path, attempt, "Generating pseudocode");
            let feedback = machine.feedback().map(str::to_owned);
            let event = match self.agent.generate_pseudocode(&ctx, feedback.as_deref()).await {
                Ok(text) => match acceptance::accept_pseudocode(
                    &text,
                    self.settings.min_content_chars,
                    &self.settings.pseudo_marker,
                ) {
                    Ok(content) => self.store_artifact(ArtifactKind::Pseudocode, &file.path, &content),
                    Err(reason) => GenerationEvent::Rejected(reason),
                },
                Err(e) => GenerationEvent::CallFailed(e.to_string()),
            };
            log_generation_event(&file.path, Phase::PseudoGen, attempt, &event);
            machine.apply(event);
        }

        self.finish_generation(&file.path, Phase::PseudoGen, &machine)
    }

    /// Generate and store code for `file` from its verified pseudocode,
    /// completing `code_gen`.
    pub async fn generate_code(
        &self,
        file: &TrackedFile,
        inputs: RunInputs<'_>,
    ) -> Result<FileOutcome, PipelineError> {
        let Some(pseudocode) = self.read_or_reset(ArtifactKind::Pseudocode, &file.path, Phase::PseudoGen)?
        else {
            return Ok(FileOutcome::Failed {
                attempts: 0,
                reason: "pseudocode is missing".to_string(),
            });
        };

        let ctx = FileContext {
            path: &file.path,
            file_type: file.file_type(),
            description: &file.record.description,
            plan: inputs.plan,
            pseudocode: Some(&pseudocode),
            project_context: inputs.project_context,
            packages: inputs.packages.filter(|_| is_manifest(&file.path)),
        };
        let mut machine = GenerationMachine::new(self.budget());

        while machine.is_attempting() {
            let attempt = machine.attempts() + 1;
            debug!(file = %file.path, attempt, "Generating code");
            let feedback = machine.feedback().map(str::to_owned);
            let event = self.code_attempt(&ctx, feedback.as_deref()).await;
            log_generation_event(&file.path, Phase::CodeGen, attempt, &event);
            machine.apply(event);
        }

        self.finish_generation(&file.path, Phase::CodeGen, &machine)
    }

    /// Verify one batch of pseudocode with a single agent call.
    ///
    /// Passing files complete `pseudo_verify`. Rejected files go back to
    /// `pseudo_gen` with the issue text stored as feedback.
    pub async fn verify_pseudocode_batch(
        &self,
        batch: &Batch,
        plan: &str,
        dependency_summary: &str,
    ) -> Result<BatchOutcome, PipelineError> {
        let mut outcome = BatchOutcome::default();
        let mut present: Vec<(String, String)> = Vec::new();

        for file in &batch.files {
            match self.read_or_reset(ArtifactKind::Pseudocode, &file.path, Phase::PseudoGen)? {
                Some(content) => present.push((file.path.clone(), content)),
                None => outcome.missing.push(file.path.clone()),
            }
        }
        if present.is_empty() {
            return Ok(outcome);
        }

        let ctx = BatchReviewContext {
            plan,
            dependency_summary,
            files: present
                .iter()
                .map(|(path, content)| (path.as_str(), content.as_str()))
                .collect(),
        };

        // Regens are irrelevant here: every miss is a call failure.
        let mut machine = GenerationMachine::new(self.budget());
        let mut verdicts = None;
        while machine.is_attempting() {
            let attempt = machine.attempts() + 1;
            let event = match self.agent.verify_pseudocode_batch(&ctx).await {
                Ok(text) => match parse_batch_verdict(&text) {
                    Extraction::Parsed(parsed) => {
                        verdicts = Some(parsed);
                        GenerationEvent::Accepted
                    }
                    Extraction::Fallback(reason) => GenerationEvent::CallFailed(reason),
                },
                Err(e) => GenerationEvent::CallFailed(e.to_string()),
            };
            if let GenerationEvent::CallFailed(reason) = &event {
                warn!(files = present.len(), attempt, %reason, "Batch verification attempt failed");
            }
            machine.apply(event);
        }

        let Some(verdicts) = verdicts else {
            let reason = match machine.state() {
                GenerationState::Exhausted { reason } => reason.clone(),
                _ => "no verdict".to_string(),
            };
            outcome.unresolved = Some(reason);
            return Ok(outcome);
        };

        let paths: Vec<String> = present.into_iter().map(|(path, _)| path).collect();
        self.registry.update(|registry| {
            for path in &paths {
                let Some(record) = registry.get_mut(path) else {
                    continue;
                };
                match verdicts.get(path) {
                    Some(verdict) if verdict.pass => {
                        if record.complete(Phase::PseudoVerify) {
                            record.review_reason = None;
                            outcome.passed.push(path.clone());
                        } else {
                            outcome.refused.push(path.clone());
                        }
                    }
                    Some(verdict) => {
                        let issues = if verdict.issues.trim().is_empty() {
                            "pseudocode verification failed".to_string()
                        } else {
                            verdict.issues.clone()
                        };
                        record.reset(Phase::PseudoGen);
                        record.record_issues(issues.clone());
                        outcome.failed.push((path.clone(), issues));
                    }
                    None => outcome.unverdicted.push(path.clone()),
                }
            }
        })?;

        for (path, issues) in &outcome.failed {
            warn!(file = %path, phase = %Phase::PseudoVerify, %issues, "Pseudocode rejected");
        }
        for path in &outcome.refused {
            warn!(file = %path, phase = %Phase::PseudoVerify, "Pass not recorded: pseudocode generation incomplete");
        }
        Ok(outcome)
    }

    /// Verify one file's code, regenerating with the failure text until it
    /// passes, the regeneration budget forces an escalation, or the retry
    /// budget runs out.
    pub async fn verify_code(
        &self,
        file: &TrackedFile,
        inputs: RunInputs<'_>,
    ) -> Result<FileOutcome, PipelineError> {
        let Some(pseudocode) = self.read_or_reset(ArtifactKind::Pseudocode, &file.path, Phase::PseudoGen)?
        else {
            return Ok(FileOutcome::Failed {
                attempts: 0,
                reason: "pseudocode is missing".to_string(),
            });
        };
        let file_ctx = FileContext {
            path: &file.path,
            file_type: file.file_type(),
            description: &file.record.description,
            plan: inputs.plan,
            pseudocode: Some(&pseudocode),
            project_context: inputs.project_context,
            packages: inputs.packages.filter(|_| is_manifest(&file.path)),
        };

        let mut machine = VerificationMachine::new(self.budget());
        while machine.is_active() {
            let event = match machine.state().clone() {
                VerificationState::Attempting => {
                    let Some(code) = self.read_or_reset(ArtifactKind::Code, &file.path, Phase::CodeGen)?
                    else {
                        return Ok(FileOutcome::Failed {
                            attempts: machine.verifications(),
                            reason: "generated code is missing".to_string(),
                        });
                    };
                    let ctx = CodeReviewContext {
                        path: &file.path,
                        description: &file.record.description,
                        pseudocode: &pseudocode,
                        code: &code,
                    };
                    match self.agent.verify_code(&ctx).await {
                        Ok(text) => match parse_code_verdict(&text) {
                            Extraction::Parsed(CodeVerdict::Pass) => VerificationEvent::Passed,
                            Extraction::Parsed(CodeVerdict::Fail(issues)) => {
                                warn!(
                                    file = %file.path,
                                    phase = %Phase::CodeVerify,
                                    attempt = machine.verifications() + 1,
                                    regens = machine.regens(),
                                    "Code verification failed"
                                );
                                VerificationEvent::Failed(issues)
                            }
                            Extraction::Fallback(reason) => VerificationEvent::CallFailed(reason),
                        },
                        Err(e) => VerificationEvent::CallFailed(e.to_string()),
                    }
                }
                VerificationState::Regenerating { issues } => {
                    info!(file = %file.path, regen = machine.regens() + 1, "Regenerating code from verification feedback");
                    match self.code_attempt(&file_ctx, Some(&issues)).await {
                        GenerationEvent::Accepted => VerificationEvent::Regenerated,
                        GenerationEvent::Rejected(reason) | GenerationEvent::CallFailed(reason) => {
                            warn!(file = %file.path, %reason, "Code regeneration failed");
                            VerificationEvent::RegenFailed(reason)
                        }
                    }
                }
                _ => break,
            };
            if let VerificationEvent::CallFailed(reason) = &event {
                warn!(file = %file.path, phase = %Phase::CodeVerify, %reason, "Verification call failed");
            }
            machine.apply(event);
        }

        let path = file.path.as_str();
        match machine.state().clone() {
            VerificationState::Done => {
                let completed = self.registry.update(|registry| {
                    registry.get_mut(path).is_some_and(|record| {
                        let done = record.complete(Phase::CodeVerify);
                        if done {
                            record.clear_review();
                        }
                        done
                    })
                })?;
                if !completed {
                    return Ok(FileOutcome::Failed {
                        attempts: machine.verifications(),
                        reason: format!(
                            "{} could not be recorded: upstream phase incomplete",
                            Phase::CodeVerify
                        ),
                    });
                }
                info!(file = %path, attempts = machine.verifications(), "Code verified");
                Ok(FileOutcome::Completed {
                    attempts: machine.verifications(),
                })
            }
            VerificationState::Escalated { issues } => {
                self.registry.update(|registry| {
                    if let Some(record) = registry.get_mut(path) {
                        record.escalate(issues.clone());
                    }
                })?;
                warn!(file = %path, regens = machine.regens(), "Escalated to pseudocode regeneration");
                Ok(FileOutcome::Escalated { reason: issues })
            }
            VerificationState::Exhausted { reason } => {
                warn!(file = %path, phase = %Phase::CodeVerify, %reason, "Verification retries exhausted");
                Ok(FileOutcome::Failed {
                    attempts: machine.verifications(),
                    reason,
                })
            }
            VerificationState::Attempting | VerificationState::Regenerating { .. } => {
                Ok(FileOutcome::Failed {
                    attempts: machine.verifications(),
                    reason: "verification stopped early".to_string(),
                })
            }
        }
    }

    /// One code generation call: generate, check, store.
    async fn code_attempt(&self, ctx: &FileContext<'_>, feedback: Option<&str>) -> GenerationEvent {
        match self.agent.generate_code(ctx, feedback).await {
            Ok(text) => match acceptance::accept_code(ctx.path, &text, self.settings.min_content_chars) {
                Ok(content) => self.store_artifact(ArtifactKind::Code, ctx.path, &content),
                Err(reason) => GenerationEvent::Rejected(reason),
            },
            Err(e) => GenerationEvent::CallFailed(e.to_string()),
        }
    }

    fn store_artifact(&self, kind: ArtifactKind, path: &str, content: &str) -> GenerationEvent {
        match self.store.write(kind, path, content) {
            Ok(()) => GenerationEvent::Accepted,
            Err(e) => GenerationEvent::CallFailed(e.to_string()),
        }
    }

    /// Read an artifact. A missing one resets `phase` so it is regenerated.
    fn read_or_reset(
        &self,
        kind: ArtifactKind,
        path: &str,
        phase: Phase,
    ) -> Result<Option<String>, PipelineError> {
        let content = match self.store.read_non_empty(kind, path) {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %path, %kind, error = %e, "Artifact unreadable");
                None
            }
        };
        if content.is_none() {
            warn!(file = %path, %kind, "Artifact missing, resetting {phase}");
            self.registry.update(|registry| {
                if let Some(record) = registry.get_mut(path) {
                    record.reset(phase);
                }
            })?;
        }
        Ok(content)
    }

    fn finish_generation(
        &self,
        path: &str,
        phase: Phase,
        machine: &GenerationMachine,
    ) -> Result<FileOutcome, PipelineError> {
        match machine.state() {
            GenerationState::Done => {
                let completed = self.registry.update(|registry| {
                    registry.get_mut(path).is_some_and(|record| {
                        let done = record.complete(phase);
                        if done {
                            record.clear_review();
                        }
                        done
                    })
                })?;
                if !completed {
                    return Ok(FileOutcome::Failed {
                        attempts: machine.attempts(),
                        reason: format!("{phase} could not be recorded: upstream phase incomplete"),
                    });
                }
                info!(file = %path, %phase, attempts = machine.attempts(), "Phase complete");
                Ok(FileOutcome::Completed {
                    attempts: machine.attempts(),
                })
            }
            GenerationState::Exhausted { reason } => {
                warn!(file = %path, %phase, attempts = machine.attempts(), %reason, "Retries exhausted");
                Ok(FileOutcome::Failed {
                    attempts: machine.attempts(),
                    reason: reason.clone(),
                })
            }
            GenerationState::Attempting => Ok(FileOutcome::Failed {
                attempts: machine.attempts(),
                reason: "generation stopped early".to_string(),
            }),
        }
    }
}

fn is_manifest(path: &str) -> bool {
    path.rsplit('/').next() == Some(MANIFEST_PATH)
}

fn log_generation_event(path: &str, phase: Phase, attempt: u32, event: &GenerationEvent) {
    match event {
        GenerationEvent::Accepted => {}
        GenerationEvent::Rejected(reason) => {
            warn!(file = %path, %phase, attempt, %reason, "Output rejected");
        }
        GenerationEvent::CallFailed(reason) => {
            warn!(file = %path, %phase, attempt, %reason, "Agent call failed");
        }
    }
}

/// The project's files grouped by type, one `- path: description` line each.
pub fn project_context(registry: &Registry) -> String {
    let mut sections = Vec::new();
    for file_type in FileType::BATCH_ORDER {
        let lines: Vec<String> = registry
            .files
            .iter()
            .filter(|(_, record)| record.file_type == file_type)
            .map(|(path, record)| format!("- {path}: {}", record.description))
            .collect();
        if !lines.is_empty() {
            sections.push(format!("{file_type}:\n{}", lines.join("\n")));
        }
    }
    sections.join("\n\n")
}
