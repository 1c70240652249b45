//! The pipeline run: Planning → PlanValidation → PseudoLoop → CodeLoop → Collect.
//!
//! The registry on disk is the checkpoint. Every stage reloads it before
//! deciding what to do, and every executor step persists its change, so a
//! run can be resumed from the pseudocode loop after a crash.

pub mod state;

pub use state::{PipelineState, RunStage};

use crate::agents::Agent;
use crate::config::Config;
use crate::dag::{GraphBuilder, dependency_summary, plan_batches};
use crate::errors::PipelineError;
use crate::executor::{
    CodeVerdict, FileOutcome, PhaseExecutor, RunInputs, parse_code_verdict, project_context,
};
use crate::extract::Extraction;
use crate::phase::Phase;
use crate::plan::{build_registry, files_from_plan, parse_package_list, validate};
use crate::registry::{RegistryStore, TrackedFile};
use crate::report::RunReport;
use crate::settings::PipelineSettings;
use crate::storage::{ArtifactStore, collect_outputs, structure_warnings, write_manifest};
use crate::ui::PipelineUI;
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Pipeline<'a> {
    config: &'a Config,
    agent: &'a dyn Agent,
    store: &'a dyn ArtifactStore,
    registry: RegistryStore,
    settings: PipelineSettings,
    ui: Option<Arc<PipelineUI>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, agent: &'a dyn Agent, store: &'a dyn ArtifactStore) -> Self {
        Self {
            config,
            agent,
            store,
            registry: RegistryStore::new(config.registry_file.clone()),
            settings: config.pipeline(),
            ui: None,
        }
    }

    pub fn with_ui(mut self, ui: Arc<PipelineUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    /// Run the whole pipeline for a new application description.
    pub async fn run(&self, description: &str) -> Result<RunReport, PipelineError> {
        let warnings = validate::validate_description(description)?;
        for warning in &warnings {
            warn!("{warning}");
            self.with_ui_do(|ui| ui.warn(warning));
        }
        self.config.ensure_directories()?;

        let mut state = PipelineState::new(RunReport::new(Some(description)));
        state.report.warnings.extend(warnings);
        let result = self.execute(&mut state, Some(description)).await;
        self.finish(state, result)
    }

    /// Continue from the pseudocode loop using the stored plan and registry.
    pub async fn resume(&self) -> Result<RunReport, PipelineError> {
        let registry = self.registry.load();
        if registry.is_empty() {
            return Err(PipelineError::NothingToResume(
                "the file registry is empty; start with `stackforge run`".to_string(),
            ));
        }
        let plan = fs::read_to_string(&self.config.plan_file).map_err(|_| {
            PipelineError::NothingToResume(format!(
                "no stored plan at {}",
                self.config.relative(&self.config.plan_file).display()
            ))
        })?;
        self.config.ensure_directories()?;

        let mut state = PipelineState::new(RunReport::new(None));
        state.plan = plan;
        state.packages = fs::read_to_string(&self.config.packages_file).ok();
        info!(files = registry.len(), "Resuming from the stored registry");
        let result = self.execute(&mut state, None).await;
        self.finish(state, result)
    }

    async fn execute(
        &self,
        state: &mut PipelineState,
        description: Option<&str>,
    ) -> Result<(), PipelineError> {
        if let Some(description) = description {
            self.planning(state, description).await?;
            self.plan_validation(state, description).await?;
        }

        let max_passes = self.settings.max_passes.max(1);
        for pass in 1..=max_passes {
            state.report.passes = pass;
            info!(pass, max_passes, "Starting pass");
            self.pseudo_loop(state).await?;
            self.code_loop(state).await?;
            if self.registry.load().is_phase_complete(Phase::CodeVerify) {
                break;
            }
        }

        self.collect(state)?;
        self.enter(state, RunStage::Done);
        Ok(())
    }

    fn finish(
        &self,
        mut state: PipelineState,
        result: Result<(), PipelineError>,
    ) -> Result<RunReport, PipelineError> {
        if let Err(e) = &result {
            state.report.error = Some(e.to_string());
        }
        state.report.finish(self.registry.load().status());
        match state.report.save(&self.config.runs_dir) {
            Ok(path) => info!(report = %self.config.relative(&path).display(), "Run report saved"),
            Err(e) => warn!(error = %e, "Failed to save run report"),
        }
        self.with_ui_do(|ui| {
            ui.finish(
                &state.report,
                &self.config.relative(&self.config.output_dir).display().to_string(),
            )
        });
        result.map(|()| state.report)
    }

    async fn planning(&self, state: &mut PipelineState, description: &str) -> Result<(), PipelineError> {
        self.enter(state, RunStage::Planning);
        let plan = self
            .agent
            .plan(description)
            .await
            .map_err(PipelineError::Planning)?;
        self.adopt_plan(state, plan)?;

        match self.agent.extract_packages(&state.plan).await {
            Ok(text) => match parse_package_list(&text) {
                Extraction::Parsed(packages) => {
                    let json = serde_json::to_string_pretty(&packages)
                        .context("Failed to serialize package list")?;
                    write_text(&self.config.packages_file, &json)?;
                    info!(packages = packages.len(), "Package list extracted");
                    state.packages = Some(json);
                }
                Extraction::Fallback(reason) => warn!(%reason, "No package list in the plan"),
            },
            Err(e) => warn!(error = %e, "Package extraction failed"),
        }
        Ok(())
    }

    /// Store `plan` and rebuild the registry from its file list.
    fn adopt_plan(&self, state: &mut PipelineState, plan: String) -> Result<(), PipelineError> {
        write_text(&self.config.plan_file, &plan)?;
        let (files, source) = files_from_plan(&plan);
        let (registry, injected) = build_registry(&files, self.settings.inject_minimum_files);
        for path in &injected {
            info!(file = %path, "Added missing required file");
        }
        info!(files = registry.len(), %source, "Registry built from plan");
        self.with_ui_do(|ui| ui.plan_ready(registry.len(), &source.to_string()));
        self.registry.save(&registry)?;
        state.plan = plan;
        Ok(())
    }

    async fn plan_validation(
        &self,
        state: &mut PipelineState,
        description: &str,
    ) -> Result<(), PipelineError> {
        self.enter(state, RunStage::PlanValidation);
        let attempts = self.settings.max_plan_attempts.max(1);

        for attempt in 1..=attempts {
            let issue = match validate::validate_plan(&self.registry.load()) {
                Ok(()) => {
                    info!(attempt, "Plan validated");
                    return Ok(());
                }
                Err(issue) => issue.to_string(),
            };
            warn!(attempt, %issue, "Plan rejected");
            if attempt == attempts {
                return Err(PipelineError::PlanValidationExhausted {
                    attempts,
                    last_error: issue,
                });
            }
            match self
                .agent
                .regenerate_plan(description, &state.plan, &issue)
                .await
            {
                Ok(plan) => self.adopt_plan(state, plan)?,
                Err(e) => warn!(attempt, error = %e, "Plan regeneration failed"),
            }
        }
        Ok(())
    }

    async fn pseudo_loop(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        self.enter(state, RunStage::PseudoLoop);
        let executor = self.executor();
        let context = project_context(&self.registry.load());

        let review = self.registry.load().needs_review();
        if !review.is_empty() {
            info!(files = review.len(), "Regenerating pseudocode for escalated files");
        }
        let pending = self.registry.load().unfinished(Phase::PseudoGen);
        let review_paths: Vec<&str> = review.iter().map(|f| f.path.as_str()).collect();
        let rest: Vec<TrackedFile> = pending
            .into_iter()
            .filter(|f| !review_paths.contains(&f.path.as_str()))
            .collect();
        let queue: Vec<TrackedFile> = review
            .iter()
            .filter(|f| !f.record.is_done(Phase::PseudoGen))
            .cloned()
            .chain(rest)
            .collect();

        self.with_ui_do(|ui| ui.start_phase(Phase::PseudoGen, queue.len()));
        for file in &queue {
            self.with_ui_do(|ui| ui.file_started(Phase::PseudoGen, &file.path));
            let inputs = RunInputs {
                plan: &state.plan,
                packages: None,
                project_context: &context,
            };
            let outcome = executor.generate_pseudocode(file, inputs).await?;
            self.record(state, &file.path, Phase::PseudoGen, &outcome);
        }
        self.with_ui_do(|ui| ui.phase_done());

        // Project-wide checks need every file's pseudocode. Without it the
        // files that have pseudocode are still verified, batched by type.
        let registry = self.registry.load();
        let graph = if registry.is_phase_complete(Phase::PseudoGen) {
            if !state.sanity_checked {
                self.sanity_check(state, &context).await?;
            }

            state.dependency_summary = dependency_summary(&registry, self.store);
            if let Err(e) = write_text(&self.config.summary_file, &state.dependency_summary) {
                warn!(error = %e, "Failed to write the dependency summary");
            }

            self.settings
                .dependency_batching
                .then(|| GraphBuilder::new(&registry, self.store).build())
        } else {
            let missing = registry.unfinished(Phase::PseudoGen).len();
            warn!(missing, "Pseudocode incomplete, verifying without dependency information");
            state.dependency_summary.clear();
            None
        };
        let ready = registry.ready(Phase::PseudoVerify);
        let (batches, strategy) = plan_batches(&ready, self.settings.batch_size, graph.as_ref());
        info!(files = ready.len(), batches = batches.len(), %strategy, "Verifying pseudocode");

        self.with_ui_do(|ui| ui.start_phase(Phase::PseudoVerify, batches.len()));
        for (index, batch) in batches.iter().enumerate() {
            self.with_ui_do(|ui| ui.batch_started(index, batches.len(), &batch.paths()));
            let outcome = executor
                .verify_pseudocode_batch(batch, &state.plan, &state.dependency_summary)
                .await?;
            for path in &outcome.missing {
                state.report.record_failure(path, Phase::PseudoVerify, 0, "pseudocode missing");
            }
            for path in &outcome.refused {
                state.report.record_failure(path, Phase::PseudoVerify, 1, "pass not recorded: pseudocode generation incomplete");
            }
            if !outcome.unverdicted.is_empty() {
                warn!(files = ?outcome.unverdicted, "Verifier gave no verdict for some files");
            }
            if let Some(reason) = &outcome.unresolved {
                warn!(files = ?batch.paths(), %reason, "Batch left unresolved");
                let files = batch.paths().into_iter().map(str::to_string).collect();
                state.report.record_unresolved(files, reason);
            }
            self.with_ui_do(|ui| ui.batch_finished(&outcome));
        }
        self.with_ui_do(|ui| ui.phase_done());
        Ok(())
    }

    /// Whole-project check, once per run. Anything but a PASS verdict stops the run.
    async fn sanity_check(&self, state: &mut PipelineState, context: &str) -> Result<(), PipelineError> {
        let answer = self
            .agent
            .sanity_check(&state.plan, context)
            .await
            .map_err(|e| PipelineError::SanityCheckFailed(e.to_string()))?;
        match parse_code_verdict(&answer) {
            Extraction::Parsed(CodeVerdict::Pass) => info!("Sanity check passed"),
            Extraction::Parsed(CodeVerdict::Fail(reason)) => {
                return Err(PipelineError::SanityCheckFailed(reason));
            }
            Extraction::Fallback(reason) => {
                return Err(PipelineError::SanityCheckFailed(reason));
            }
        }
        state.sanity_checked = true;
        Ok(())
    }

    async fn code_loop(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        self.enter(state, RunStage::CodeLoop);
        let executor = self.executor();
        let context = project_context(&self.registry.load());

        let to_generate = self.registry.load().ready(Phase::CodeGen);
        self.with_ui_do(|ui| ui.start_phase(Phase::CodeGen, to_generate.len()));
        for file in &to_generate {
            self.with_ui_do(|ui| ui.file_started(Phase::CodeGen, &file.path));
            let inputs = RunInputs {
                plan: &state.plan,
                packages: state.packages.as_deref(),
                project_context: &context,
            };
            let outcome = executor.generate_code(file, inputs).await?;
            self.record(state, &file.path, Phase::CodeGen, &outcome);
        }
        self.with_ui_do(|ui| ui.phase_done());

        let to_verify = self.registry.load().ready(Phase::CodeVerify);
        self.with_ui_do(|ui| ui.start_phase(Phase::CodeVerify, to_verify.len()));
        for file in &to_verify {
            self.with_ui_do(|ui| ui.file_started(Phase::CodeVerify, &file.path));
            let inputs = RunInputs {
                plan: &state.plan,
                packages: state.packages.as_deref(),
                project_context: &context,
            };
            let outcome = executor.verify_code(file, inputs).await?;
            self.record(state, &file.path, Phase::CodeVerify, &outcome);
        }
        self.with_ui_do(|ui| ui.phase_done());
        Ok(())
    }

    fn collect(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        self.enter(state, RunStage::Collect);
        let registry = self.registry.load();
        let mut outputs = collect_outputs(&self.config.output_dir)?;
        let before = outputs.len();
        outputs.retain(|path, _| registry.contains(path));
        if outputs.len() < before {
            info!(skipped = before - outputs.len(), "Ignoring output files not in the registry");
        }
        if outputs.is_empty() {
            warn!("No generated files to collect");
        } else {
            let (manifest, path) = write_manifest(&self.config.output_dir, &outputs)?;
            info!(
                files = manifest.total_files,
                lines = manifest.total_lines,
                bytes = manifest.total_bytes,
                manifest = %self.config.relative(&path).display(),
                "Outputs collected"
            );
        }
        state.report.output_files = outputs.len();
        for warning in structure_warnings(&outputs) {
            warn!("{warning}");
            state.report.warnings.push(warning);
        }
        Ok(())
    }

    fn record(&self, state: &mut PipelineState, path: &str, phase: Phase, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Completed { .. } => {}
            FileOutcome::Failed { attempts, reason } => {
                state.report.record_failure(path, phase, *attempts, reason);
            }
            FileOutcome::Escalated { reason } => state.report.record_escalation(path, reason),
        }
        self.with_ui_do(|ui| ui.file_finished(path, outcome));
    }

    fn executor(&self) -> PhaseExecutor<'_> {
        PhaseExecutor::new(self.agent, self.store, &self.registry, &self.settings)
    }

    fn enter(&self, state: &mut PipelineState, stage: RunStage) {
        info!(%stage, "Entering stage");
        state.enter(stage);
        self.with_ui_do(|ui| ui.start_stage(stage));
    }

    fn with_ui_do(&self, f: impl FnOnce(&PipelineUI)) {
        if let Some(ui) = &self.ui {
            f(ui);
        }
    }
}

fn write_text(path: &Path, content: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
