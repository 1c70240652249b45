use crate::executor::{BatchOutcome, FileOutcome};
use crate::orchestrator::RunStage;
use crate::phase::Phase;
use crate::report::RunReport;
use crate::ui::icons::{BATCH, CHECK, CROSS, ESCALATE, FOLDER, PLAN, REVIEW, SPARKLE, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Stages shown on the stage bar.
const STAGES: u64 = 5;

/// Terminal UI for a pipeline run, rendered with `indicatif`.
///
/// Two bars are stacked:
/// - Stage bar, one step per pipeline stage
/// - Work bar, files or batches done in the current phase, with a spinner
///   message naming the file in flight
pub struct PipelineUI {
    multi: MultiProgress,
    stage_bar: ProgressBar,
    work_bar: ProgressBar,
    verbose: bool,
}

impl PipelineUI {
    pub fn new(verbose: bool) -> Self {
        Self::with_target(ProgressDrawTarget::stderr(), verbose)
    }

    /// A UI that draws nothing, for tests and non-interactive runs.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden(), false)
    }

    fn with_target(target: ProgressDrawTarget, verbose: bool) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let stage_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");
        let stage_bar = multi.add(ProgressBar::new(STAGES));
        stage_bar.set_style(stage_style);
        stage_bar.set_prefix("Stage");

        let work_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {spinner} [{bar:30.green/white}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("=> ");
        let work_bar = multi.add(ProgressBar::new(0));
        work_bar.set_style(work_style);
        work_bar.set_prefix(" Work");

        Self {
            multi,
            stage_bar,
            work_bar,
            verbose,
        }
    }

    /// Print above the bars, falling back to stderr when the terminal is gone.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn start_stage(&self, stage: RunStage) {
        let position = match stage {
            RunStage::Planning => 0,
            RunStage::PlanValidation => 1,
            RunStage::PseudoLoop => 2,
            RunStage::CodeLoop => 3,
            RunStage::Collect => 4,
            RunStage::Done => STAGES,
        };
        self.stage_bar.set_position(position);
        self.stage_bar
            .set_message(style(stage.as_str()).yellow().to_string());
    }

    pub fn plan_ready(&self, files: usize, source: &str) {
        self.print_line(format!(
            "{}Plan lists {} files {}",
            PLAN,
            style(files).cyan(),
            style(format!("(from {source})")).dim()
        ));
    }

    /// Reset the work bar for a phase over `total` items.
    pub fn start_phase(&self, phase: Phase, total: usize) {
        self.work_bar.reset();
        self.work_bar.set_length(total as u64);
        self.work_bar.set_message(phase.to_string());
        self.work_bar.enable_steady_tick(Duration::from_millis(100));
        if self.verbose {
            self.print_line(format!("  {} {} ({total})", style("→").dim(), phase));
        }
    }

    pub fn file_started(&self, phase: Phase, path: &str) {
        self.work_bar
            .set_message(format!("{phase} {}", style(path).cyan()));
    }

    pub fn file_finished(&self, path: &str, outcome: &FileOutcome) {
        self.work_bar.inc(1);
        match outcome {
            FileOutcome::Completed { attempts } => {
                if self.verbose {
                    self.print_line(format!(
                        "    {}{} {}",
                        CHECK,
                        path,
                        style(format!("({attempts} attempts)")).dim()
                    ));
                }
            }
            FileOutcome::Failed { reason, .. } => {
                self.print_line(format!("    {}{}: {}", CROSS, path, style(reason).red()));
            }
            FileOutcome::Escalated { .. } => {
                self.print_line(format!(
                    "    {}{} sent back to pseudocode",
                    ESCALATE,
                    style(path).yellow()
                ));
            }
        }
    }

    pub fn batch_started(&self, index: usize, total: usize, files: &[&str]) {
        self.work_bar
            .set_message(format!("{BATCH}batch {}/{total}", index + 1));
        if self.verbose {
            self.print_line(format!("    {}{}", BATCH, files.join(", ")));
        }
    }

    pub fn batch_finished(&self, outcome: &BatchOutcome) {
        self.work_bar.inc(1);
        for (path, issues) in &outcome.failed {
            self.print_line(format!("    {}{}: {}", REVIEW, path, style(issues).dim()));
        }
        if let Some(reason) = &outcome.unresolved {
            self.print_line(format!("    {}batch unresolved: {}", WARN, reason));
        }
    }

    pub fn warn(&self, msg: &str) {
        self.print_line(format!("{}{}", WARN, style(msg).yellow()));
    }

    pub fn phase_done(&self) {
        self.work_bar.disable_steady_tick();
    }

    /// Clear the bars and print the run summary.
    pub fn finish(&self, report: &RunReport, output_dir: &str) {
        self.work_bar.finish_and_clear();
        self.stage_bar.finish_and_clear();

        let status = &report.status;
        let icon = if report.succeeded() { SPARKLE } else { WARN };
        self.print_line(format!(
            "{}Verified {}/{} files in {} pass(es)",
            icon,
            style(status.code_verified).green().bold(),
            status.total,
            report.passes
        ));
        if !report.failures.is_empty() || !report.escalations.is_empty() {
            self.print_line(format!(
                "   {} failures, {} escalations, {} need review",
                style(report.failures.len()).red(),
                style(report.escalations.len()).yellow(),
                status.needs_review
            ));
        }
        if report.output_files > 0 {
            self.print_line(format!(
                "{}{} files in {}",
                FOLDER,
                report.output_files,
                style(output_dir).cyan()
            ));
        }
    }
}
