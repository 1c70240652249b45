//! The four per-file phases of the generation pipeline.
//!
//! Every tracked file moves through the phases strictly in order:
//!
//! ```text
//! PseudoGen -> PseudoVerify -> CodeGen -> CodeVerify
//! ```
//!
//! Each phase owns one boolean flag on a [`FileRecord`](crate::registry::FileRecord).
//! The flag names are part of the persisted registry format.

use serde::{Deserialize, Serialize};

/// A per-file pipeline phase, ordered from first to last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Pseudocode artifact produced by the reasoning agent
    PseudoGen,
    /// Pseudocode reviewed in batches
    PseudoVerify,
    /// Source file produced from the verified pseudocode
    CodeGen,
    /// Source file reviewed against its pseudocode
    CodeVerify,
}

impl Phase {
    /// All phases in pipeline order.
    pub const ALL: [Phase; 4] = [
        Phase::PseudoGen,
        Phase::PseudoVerify,
        Phase::CodeGen,
        Phase::CodeVerify,
    ];

    /// Name of the completion flag in the persisted registry.
    pub fn flag_name(self) -> &'static str {
        match self {
            Phase::PseudoGen => "is_pseudo_gen",
            Phase::PseudoVerify => "is_pseudo_ver",
            Phase::CodeGen => "is_code_gen",
            Phase::CodeVerify => "is_code_ver",
        }
    }

    /// The phase that must be complete before this one may complete.
    pub fn upstream(self) -> Option<Phase> {
        match self {
            Phase::PseudoGen => None,
            Phase::PseudoVerify => Some(Phase::PseudoGen),
            Phase::CodeGen => Some(Phase::PseudoVerify),
            Phase::CodeVerify => Some(Phase::CodeGen),
        }
    }

    /// This phase and every phase after it.
    pub fn and_downstream(self) -> impl Iterator<Item = Phase> {
        Phase::ALL.into_iter().filter(move |p| *p >= self)
    }

    /// Whether this phase generates an artifact (as opposed to verifying one).
    pub fn is_generation(self) -> bool {
        matches!(self, Phase::PseudoGen | Phase::CodeGen)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::PseudoGen => "pseudo_gen",
            Phase::PseudoVerify => "pseudo_verify",
            Phase::CodeGen => "code_gen",
            Phase::CodeVerify => "code_verify",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pseudo_gen" => Ok(Phase::PseudoGen),
            "pseudo_verify" | "pseudo_ver" => Ok(Phase::PseudoVerify),
            "code_gen" => Ok(Phase::CodeGen),
            "code_verify" | "code_ver" => Ok(Phase::CodeVerify),
            _ => anyhow::bail!(
                "Invalid phase '{}'. Valid values: pseudo_gen, pseudo_verify, code_gen, code_verify",
                s
            ),
        }
    }
}
