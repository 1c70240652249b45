use crate::report::RunReport;
use serde::{Deserialize, Serialize};

/// Where a run is, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Planning,
    PlanValidation,
    PseudoLoop,
    CodeLoop,
    Collect,
    Done,
}

impl RunStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Planning => "planning",
            RunStage::PlanValidation => "plan validation",
            RunStage::PseudoLoop => "pseudocode loop",
            RunStage::CodeLoop => "code loop",
            RunStage::Collect => "collect",
            RunStage::Done => "done",
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values threaded from one stage to the next.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub plan: String,
    /// Package list as pretty JSON, when one could be extracted
    pub packages: Option<String>,
    pub dependency_summary: String,
    pub stage: RunStage,
    /// Whether the pseudocode sanity check already passed this run
    pub sanity_checked: bool,
    pub report: RunReport,
}

impl PipelineState {
    pub fn new(report: RunReport) -> Self {
        Self {
            plan: String::new(),
            packages: None,
            dependency_summary: String::new(),
            stage: RunStage::Planning,
            sanity_checked: false,
            report,
        }
    }

    pub fn enter(&mut self, stage: RunStage) {
        self.stage = stage;
        self.report.stage = stage;
    }
}
