//! Retry, regeneration and escalation as small state machines.
//!
//! The machines hold no I/O. The executor feeds them the outcome of each
//! agent call and asks what to do next, so every budget rule is testable on
//! its own.
//!
//! Two counters are tracked:
//! - `retries` counts failed agent calls and rejected output, bounded by
//!   `max_retries`
//! - `regens` counts quality-driven repeats, bounded by `max_regens_per_file`
//!
//! A verification failure spends a regen, not a retry, so a file that keeps
//! failing review is escalated after `max_regens + 1` verdicts.

use crate::settings::PipelineSettings;

/// Attempt bounds shared by every per-file machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_retries: u32,
    pub max_regens: u32,
}

impl RetryBudget {
    pub fn new(max_retries: u32, max_regens: u32) -> Self {
        Self {
            max_retries,
            max_regens,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(settings.max_retries, settings.max_regens_per_file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    Attempting,
    Done,
    Exhausted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Content passed local validation and was stored
    Accepted,
    /// Content failed local validation
    Rejected(String),
    /// The agent call itself failed
    CallFailed(String),
}

/// Drives one file through one generation phase.
#[derive(Debug, Clone)]
pub struct GenerationMachine {
    budget: RetryBudget,
    state: GenerationState,
    attempts: u32,
    retries: u32,
    regens: u32,
    feedback: Option<String>,
}

impl GenerationMachine {
    pub fn new(budget: RetryBudget) -> Self {
        let state = if budget.max_retries == 0 {
            GenerationState::Exhausted {
                reason: "retry budget is zero".to_string(),
            }
        } else {
            GenerationState::Attempting
        };
        Self {
            budget,
            state,
            attempts: 0,
            retries: 0,
            regens: 0,
            feedback: None,
        }
    }

    /// Seed the first attempt with feedback from an earlier verification.
    pub fn with_feedback(mut self, feedback: Option<String>) -> Self {
        self.feedback = feedback.filter(|f| !f.trim().is_empty());
        self
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    pub fn is_attempting(&self) -> bool {
        self.state == GenerationState::Attempting
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn regens(&self) -> u32 {
        self.regens
    }

    /// Text to hand the next attempt: the last rejection or seeded feedback.
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn apply(&mut self, event: GenerationEvent) -> &GenerationState {
        if !self.is_attempting() {
            return &self.state;
        }
        self.attempts += 1;
        let (reason, regen_spent) = match event {
            GenerationEvent::Accepted => {
                self.state = GenerationState::Done;
                return &self.state;
            }
            GenerationEvent::Rejected(reason) => {
                self.retries += 1;
                self.regens += 1;
                (reason, self.regens >= self.budget.max_regens)
            }
            GenerationEvent::CallFailed(reason) => {
                self.retries += 1;
                (reason, false)
            }
        };
        if regen_spent || self.retries >= self.budget.max_retries {
            self.state = GenerationState::Exhausted {
                reason: reason.clone(),
            };
        }
        self.feedback = Some(reason);
        &self.state
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    /// Verify the current artifact
    Attempting,
    /// Verification failed; regenerate using `issues` as feedback
    Regenerating { issues: String },
    /// Regeneration budget spent; send the file back upstream
    Escalated { issues: String },
    Done,
    Exhausted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationEvent {
    Passed,
    Failed(String),
    /// The verification call failed or its answer was unusable
    CallFailed(String),
    Regenerated,
    RegenFailed(String),
}

/// Drives one file through verify, regenerate and escalate.
#[derive(Debug, Clone)]
pub struct VerificationMachine {
    budget: RetryBudget,
    state: VerificationState,
    verifications: u32,
    retries: u32,
    regens: u32,
}

impl VerificationMachine {
    pub fn new(budget: RetryBudget) -> Self {
        let state = if budget.max_retries == 0 {
            VerificationState::Exhausted {
                reason: "retry budget is zero".to_string(),
            }
        } else {
            VerificationState::Attempting
        };
        Self {
            budget,
            state,
            verifications: 0,
            retries: 0,
            regens: 0,
        }
    }

    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    /// True while another agent call is needed.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            VerificationState::Attempting | VerificationState::Regenerating { .. }
        )
    }

    /// Verification calls made, including failed ones.
    pub fn verifications(&self) -> u32 {
        self.verifications
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn regens(&self) -> u32 {
        self.regens
    }

    pub fn apply(&mut self, event: VerificationEvent) -> &VerificationState {
        let next = match (&self.state, event) {
            (VerificationState::Attempting, VerificationEvent::Passed) => {
                self.verifications += 1;
                VerificationState::Done
            }
            (VerificationState::Attempting, VerificationEvent::Failed(issues)) => {
                self.verifications += 1;
                if self.regens >= self.budget.max_regens {
                    VerificationState::Escalated { issues }
                } else {
                    VerificationState::Regenerating { issues }
                }
            }
            (VerificationState::Attempting, VerificationEvent::CallFailed(reason)) => {
                self.verifications += 1;
                self.retries += 1;
                self.exhausted_or(reason, VerificationState::Attempting)
            }
            (VerificationState::Regenerating { .. }, VerificationEvent::Regenerated) => {
                self.regens += 1;
                VerificationState::Attempting
            }
            (VerificationState::Regenerating { issues }, VerificationEvent::RegenFailed(reason)) => {
                self.retries += 1;
                let retry = VerificationState::Regenerating {
                    issues: issues.clone(),
                };
                self.exhausted_or(reason, retry)
            }
            (state, _) => state.clone(),
        };
        self.state = next;
        &self.state
    }

    fn exhausted_or(&self, reason: String, otherwise: VerificationState) -> VerificationState {
        if self.retries >= self.budget.max_retries {
            VerificationState::Exhausted { reason }
        } else {
            otherwise
        }
    }
}
