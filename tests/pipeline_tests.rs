//! End-to-end pipeline runs against a scripted agent.

use async_trait::async_trait;
use stackforge::agents::{Agent, BatchReviewContext, CodeReviewContext, FileContext};
use stackforge::config::Config;
use stackforge::dag::Batch;
use stackforge::errors::{AgentError, PipelineError};
use stackforge::executor::{FileOutcome, PhaseExecutor, RunInputs};
use stackforge::orchestrator::{Pipeline, RunStage};
use stackforge::phase::Phase;
use stackforge::registry::{FileRecord, FileType, Registry, RegistryStore};
use stackforge::report::list_runs;
use stackforge::settings::{Settings, StackforgeToml};
use stackforge::storage::{ArtifactKind, FsArtifactStore, MemoryArtifactStore};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tempfile::TempDir;

const DESCRIPTION: &str = "A todo list app with an express backend and a small react frontend";

const PLAN: &str = r#"Here is the plan.
{"files": [
  {"path": "package.json", "type": "config", "description": "npm manifest"},
  {"path": "server.js", "type": "backend", "description": "express entry point"},
  {"path": "src/App.js", "type": "frontend", "description": "root component"}
]}"#;

/// Answers every agent call from fixed scripts and counts the calls.
struct ScriptedAgent {
    plan: String,
    sanity: String,
    /// Files whose pseudocode is always too short
    short_pseudo: HashSet<String>,
    /// Files whose code review always fails
    failing_review: HashSet<String>,
    /// Fixed answer for every pseudocode batch review
    batch_answer: Option<String>,
    /// Generation calls fail outright
    broken_generation: bool,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedAgent {
    fn new() -> Self {
        Self {
            plan: PLAN.to_string(),
            sanity: "PASS".to_string(),
            short_pseudo: HashSet::new(),
            failing_review: HashSet::new(),
            batch_answer: None,
            broken_generation: false,
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn with_plan(mut self, plan: &str) -> Self {
        self.plan = plan.to_string();
        self
    }

    fn with_sanity(mut self, answer: &str) -> Self {
        self.sanity = answer.to_string();
        self
    }

    fn with_short_pseudo(mut self, path: &str) -> Self {
        self.short_pseudo.insert(path.to_string());
        self
    }

    fn with_failing_review(mut self, path: &str) -> Self {
        self.failing_review.insert(path.to_string());
        self
    }

    fn with_batch_answer(mut self, answer: &str) -> Self {
        self.batch_answer = Some(answer.to_string());
        self
    }

    fn with_broken_generation(mut self) -> Self {
        self.broken_generation = true;
        self
    }

    fn count(&self, key: &str) {
        *self.calls.lock().unwrap().entry(key.to_string()).or_default() += 1;
    }

    fn calls(&self, key: &str) -> u32 {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn plan(&self, _description: &str) -> Result<String, AgentError> {
        self.count("plan");
        Ok(self.plan.clone())
    }

    async fn regenerate_plan(
        &self,
        _description: &str,
        _previous: &str,
        _feedback: &str,
    ) -> Result<String, AgentError> {
        self.count("regenerate_plan");
        Ok(self.plan.clone())
    }

    async fn extract_packages(&self, _plan: &str) -> Result<String, AgentError> {
        Ok(r#"{"dependencies": {"express": "^4.18.2"}}"#.to_string())
    }

    async fn generate_pseudocode(
        &self,
        ctx: &FileContext<'_>,
        _feedback: Option<&str>,
    ) -> Result<String, AgentError> {
        self.count(&format!("pseudo:{}", ctx.path));
        if self.broken_generation {
            return Err(AgentError::NonZeroExit {
                exit_code: 1,
                stderr: "rate limited".to_string(),
            });
        }
        if self.short_pseudo.contains(ctx.path) {
            return Ok("BEGIN FILE".to_string());
        }
        Ok(format!(
            "BEGIN FILE: {}\n# Imports/Dependencies:\n- express\n\nFUNCTION main\n  handle requests for {}\nEND",
            ctx.path, ctx.description
        ))
    }

    async fn verify_pseudocode_batch(
        &self,
        ctx: &BatchReviewContext<'_>,
    ) -> Result<String, AgentError> {
        self.count("verify_batch");
        if let Some(answer) = &self.batch_answer {
            return Ok(answer.clone());
        }
        let verdicts: serde_json::Map<String, serde_json::Value> = ctx
            .files
            .iter()
            .map(|(path, _)| {
                (
                    path.to_string(),
                    serde_json::json!({"pass": true, "issues": null}),
                )
            })
            .collect();
        Ok(serde_json::Value::Object(verdicts).to_string())
    }

    async fn generate_code(
        &self,
        ctx: &FileContext<'_>,
        _feedback: Option<&str>,
    ) -> Result<String, AgentError> {
        self.count(&format!("code:{}", ctx.path));
        if self.broken_generation {
            return Err(AgentError::EmptyResponse);
        }
        if ctx.path.ends_with(".json") {
            return Ok(
                r#"```json
{"name": "todo-app", "version": "1.0.0", "dependencies": {"express": "^4.18.2"}}
```"#
                    .to_string(),
            );
        }
        Ok(format!(
            "// {}\nconst express = require('express');\nmodule.exports = function handler() {{ return express; }};\n",
            ctx.path
        ))
    }

    async fn verify_code(&self, ctx: &CodeReviewContext<'_>) -> Result<String, AgentError> {
        self.count(&format!("review:{}", ctx.path));
        if self.failing_review.contains(ctx.path) {
            return Ok("FAIL\nThe component never renders the todo list.".to_string());
        }
        Ok("PASS".to_string())
    }

    async fn sanity_check(&self, _plan: &str, _file_list: &str) -> Result<String, AgentError> {
        self.count("sanity");
        Ok(self.sanity.clone())
    }
}

fn project(toml: &str) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let settings = Settings::from_toml(
        dir.path().to_path_buf(),
        StackforgeToml::parse(toml).unwrap(),
    );
    let config = Config::from_settings(dir.path().to_path_buf(), false, settings);
    (dir, config)
}

fn store_for(config: &Config) -> FsArtifactStore {
    FsArtifactStore::new(&config.pseudo_dir, &config.output_dir)
}

#[tokio::test]
async fn test_happy_path_verifies_every_file() {
    let (_dir, config) = project("");
    let agent = ScriptedAgent::new();
    let store = store_for(&config);

    let report = Pipeline::new(&config, &agent, &store)
        .run(DESCRIPTION)
        .await
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(report.stage, RunStage::Done);
    assert_eq!(report.passes, 1);
    assert_eq!(report.status.total, 3);
    assert_eq!(report.status.code_verified, 3);
    assert!(report.failures.is_empty());
    assert_eq!(agent.calls("sanity"), 1);

    assert!(config.plan_file.exists());
    assert!(config.packages_file.exists());
    assert!(config.summary_file.exists());
    assert!(config.output_dir.join("server.js").exists());
    assert!(config.output_dir.join("src/App.js").exists());
    let manifest = std::fs::read_to_string(config.output_dir.join("package.json")).unwrap();
    assert!(manifest.starts_with('{'));
    assert_eq!(list_runs(&config.runs_dir).unwrap().len(), 1);
}

#[tokio::test]
async fn test_injects_missing_server_entry() {
    let (_dir, config) = project("");
    let agent = ScriptedAgent::new().with_plan(
        r#"{"files": [{"path": "package.json", "type": "config", "description": "manifest"}]}"#,
    );
    let store = store_for(&config);

    let report = Pipeline::new(&config, &agent, &store)
        .run(DESCRIPTION)
        .await
        .unwrap();

    let registry = RegistryStore::new(config.registry_file.clone()).load();
    assert!(registry.contains("server.js"));
    assert_eq!(agent.calls("regenerate_plan"), 0);
    assert!(report.succeeded());
}

#[tokio::test]
async fn test_pseudocode_retries_stop_at_budget() {
    let (_dir, config) = project("[pipeline]\nmax_retries = 3\nmax_passes = 1\n");
    let agent = ScriptedAgent::new().with_short_pseudo("src/App.js");
    let store = store_for(&config);

    let report = Pipeline::new(&config, &agent, &store)
        .run(DESCRIPTION)
        .await
        .unwrap();

    assert_eq!(agent.calls("pseudo:src/App.js"), 3);
    assert_eq!(agent.calls("pseudo:server.js"), 1);
    assert!(!report.succeeded());
    let failure = report
        .failures
        .iter()
        .find(|f| f.path == "src/App.js")
        .unwrap();
    assert_eq!(failure.phase, Phase::PseudoGen);
    assert_eq!(failure.attempts, 3);

    // The sanity check needs every file; the rest carry on without it.
    assert_eq!(agent.calls("sanity"), 0);
    assert_eq!(agent.calls("verify_batch"), 2);
    assert_eq!(agent.calls("code:server.js"), 1);
    assert_eq!(agent.calls("code:src/App.js"), 0);
    let registry = RegistryStore::new(config.registry_file.clone()).load();
    assert!(!registry.get("src/App.js").unwrap().is_done(Phase::PseudoGen));
    assert!(registry.get("server.js").unwrap().is_done(Phase::CodeVerify));
    assert!(registry.get("package.json").unwrap().is_done(Phase::CodeVerify));
    assert_eq!(report.output_files, 2);
}

#[tokio::test]
async fn test_repeated_review_failure_escalates() {
    let (_dir, config) = project(
        "[pipeline]\nmax_retries = 10\nmax_regens_per_file = 2\nmax_passes = 1\n",
    );
    let agent = ScriptedAgent::new().with_failing_review("src/App.js");
    let store = store_for(&config);

    let report = Pipeline::new(&config, &agent, &store)
        .run(DESCRIPTION)
        .await
        .unwrap();

    assert_eq!(agent.calls("review:src/App.js"), 3);
    assert_eq!(agent.calls("code:src/App.js"), 3);
    assert_eq!(report.escalations.len(), 1);
    assert_eq!(report.escalations[0].path, "src/App.js");

    let registry = RegistryStore::new(config.registry_file.clone()).load();
    let record = registry.get("src/App.js").unwrap();
    for phase in Phase::ALL {
        assert!(!record.is_done(phase), "{phase} should be reset");
    }
    assert!(record.needs_review);
    assert!(
        record
            .review_reason
            .as_deref()
            .unwrap()
            .contains("never renders")
    );
    assert!(registry.get("server.js").unwrap().is_done(Phase::CodeVerify));
}

#[tokio::test]
async fn test_escalated_file_gets_new_pseudocode_next_pass() {
    let (_dir, config) = project("[pipeline]\nmax_regens_per_file = 0\nmax_passes = 2\n");
    let agent = ScriptedAgent::new().with_failing_review("src/App.js");
    let store = store_for(&config);

    let report = Pipeline::new(&config, &agent, &store)
        .run(DESCRIPTION)
        .await
        .unwrap();

    // Escalated in both passes; only the escalated file's pseudocode is redone.
    assert_eq!(report.passes, 2);
    assert_eq!(agent.calls("pseudo:src/App.js"), 2);
    assert_eq!(agent.calls("pseudo:server.js"), 1);
    assert_eq!(report.escalations.len(), 2);
    assert_eq!(agent.calls("sanity"), 1);
}

#[tokio::test]
async fn test_plan_validation_exhausts() {
    let (_dir, config) = project(
        "[pipeline]\nmax_plan_attempts = 3\ninject_minimum_files = false\n",
    );
    let agent = ScriptedAgent::new().with_plan(
        r#"{"files": [{"path": "package.json", "type": "config", "description": "manifest"}]}"#,
    );
    let store = store_for(&config);

    let err = Pipeline::new(&config, &agent, &store)
        .run(DESCRIPTION)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::PlanValidationExhausted { attempts: 3, .. }
    ));
    assert_eq!(agent.calls("regenerate_plan"), 2);
    assert_eq!(agent.calls("pseudo:package.json"), 0);

    let runs = list_runs(&config.runs_dir).unwrap();
    assert_eq!(runs.len(), 1);
    let saved = stackforge::report::RunReport::load(&runs[0]).unwrap();
    assert_eq!(saved.stage, RunStage::PlanValidation);
    assert!(saved.error.is_some());
}

#[tokio::test]
async fn test_sanity_failure_stops_run() {
    let (_dir, config) = project("");
    let agent = ScriptedAgent::new().with_sanity("FAIL: server.js never mounts the API routes");
    let store = store_for(&config);

    let err = Pipeline::new(&config, &agent, &store)
        .run(DESCRIPTION)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SanityCheckFailed(_)));
    assert_eq!(agent.calls("verify_batch"), 0);
    assert_eq!(agent.calls("code:server.js"), 0);
}

#[tokio::test]
async fn test_unclear_sanity_answer_stops_run() {
    let (_dir, config) = project("");
    let agent = ScriptedAgent::new().with_sanity("Looks reasonable overall.");
    let store = store_for(&config);

    let err = Pipeline::new(&config, &agent, &store)
        .run(DESCRIPTION)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::SanityCheckFailed(_)));
    assert_eq!(agent.calls("verify_batch"), 0);
}

#[tokio::test]
async fn test_short_description_is_rejected() {
    let (_dir, config) = project("");
    let agent = ScriptedAgent::new();
    let store = store_for(&config);

    let err = Pipeline::new(&config, &agent, &store)
        .run("todo app")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidDescription(_)));
    assert_eq!(agent.calls("plan"), 0);
}

#[tokio::test]
async fn test_resume_requires_registry_and_plan() {
    let (_dir, config) = project("");
    let agent = ScriptedAgent::new();
    let store = store_for(&config);
    let pipeline = Pipeline::new(&config, &agent, &store);

    let err = pipeline.resume().await.unwrap_err();
    assert!(matches!(err, PipelineError::NothingToResume(_)));

    let mut registry = Registry::new();
    registry.insert("server.js", FileRecord::new(FileType::Backend, "entry"));
    pipeline.registry().save(&registry).unwrap();
    let err = pipeline.resume().await.unwrap_err();
    assert!(err.to_string().contains("plan"));
}

#[tokio::test]
async fn test_resume_finishes_interrupted_run() {
    let (_dir, config) = project("[pipeline]\nmax_retries = 1\nmax_passes = 1\n");
    let store = store_for(&config);

    let flaky = ScriptedAgent::new().with_short_pseudo("src/App.js");
    let first = Pipeline::new(&config, &flaky, &store)
        .run(DESCRIPTION)
        .await
        .unwrap();
    assert!(!first.succeeded());

    let agent = ScriptedAgent::new();
    let report = Pipeline::new(&config, &agent, &store)
        .resume()
        .await
        .unwrap();

    assert!(report.resumed);
    assert!(report.succeeded());
    assert_eq!(agent.calls("plan"), 0);
    assert_eq!(agent.calls("pseudo:server.js"), 0);
    assert_eq!(agent.calls("pseudo:src/App.js"), 1);
    assert_eq!(list_runs(&config.runs_dir).unwrap().len(), 2);
}

#[tokio::test]
async fn test_batch_with_missing_pseudocode_resets_generation() {
    let dir = TempDir::new().unwrap();
    let registry_store = RegistryStore::new(dir.path().join("files.json"));
    let mut registry = Registry::new();
    for path in ["server.js", "routes/api.js"] {
        let mut record = FileRecord::new(FileType::Backend, "");
        record.complete(Phase::PseudoGen);
        registry.insert(path, record);
    }
    registry_store.save(&registry).unwrap();

    let store = MemoryArtifactStore::new().with(
        ArtifactKind::Pseudocode,
        "server.js",
        "BEGIN FILE: server.js\nlisten on port 3000",
    );
    let agent = ScriptedAgent::new();
    let settings = StackforgeToml::default().pipeline;
    let executor = PhaseExecutor::new(&agent, &store, &registry_store, &settings);

    let batch = Batch {
        files: registry_store.load().tracked(),
    };
    let outcome = executor
        .verify_pseudocode_batch(&batch, PLAN, "")
        .await
        .unwrap();

    assert_eq!(outcome.missing, vec!["routes/api.js".to_string()]);
    assert_eq!(outcome.passed, vec!["server.js".to_string()]);
    let registry = registry_store.load();
    assert!(!registry.get("routes/api.js").unwrap().is_done(Phase::PseudoGen));
    assert!(registry.get("server.js").unwrap().is_done(Phase::PseudoVerify));
}

/// Registry store in `dir` holding backend files with the given phases done.
fn seed(dir: &TempDir, files: &[(&str, &[Phase])]) -> RegistryStore {
    let store = RegistryStore::new(dir.path().join("files.json"));
    let mut registry = Registry::new();
    for (path, done) in files {
        let mut record = FileRecord::new(FileType::Backend, "");
        for phase in done.iter() {
            assert!(record.complete(*phase));
        }
        registry.insert(*path, record);
    }
    store.save(&registry).unwrap();
    store
}

const SERVER_PSEUDO: &str = "BEGIN FILE: server.js\nlisten on port 3000";
const ROUTES_PSEUDO: &str = "BEGIN FILE: routes/api.js\nCRUD handlers for todos";

fn pseudo_store() -> MemoryArtifactStore {
    MemoryArtifactStore::new()
        .with(ArtifactKind::Pseudocode, "server.js", SERVER_PSEUDO)
        .with(ArtifactKind::Pseudocode, "routes/api.js", ROUTES_PSEUDO)
}

#[tokio::test]
async fn test_batch_rejection_resets_file_and_keeps_issues() {
    let dir = TempDir::new().unwrap();
    let registry_store = seed(
        &dir,
        &[
            ("server.js", &[Phase::PseudoGen, Phase::PseudoVerify, Phase::CodeGen]),
            ("routes/api.js", &[Phase::PseudoGen]),
        ],
    );
    let store = pseudo_store();
    let agent = ScriptedAgent::new().with_batch_answer(
        r#"Review:
{"server.js": {"pass": false, "issues": ["never calls listen", "no error handler"]},
 "routes/api.js": {"pass": true, "issues": null}}"#,
    );
    let settings = StackforgeToml::default().pipeline;
    let executor = PhaseExecutor::new(&agent, &store, &registry_store, &settings);

    let batch = Batch {
        files: registry_store.load().tracked(),
    };
    let outcome = executor
        .verify_pseudocode_batch(&batch, PLAN, "")
        .await
        .unwrap();

    assert_eq!(
        outcome.failed,
        vec![(
            "server.js".to_string(),
            "never calls listen; no error handler".to_string()
        )]
    );
    assert_eq!(outcome.passed, vec!["routes/api.js".to_string()]);

    let registry = registry_store.load();
    let server = registry.get("server.js").unwrap();
    for phase in Phase::ALL {
        assert!(!server.is_done(phase), "{phase} should be reset");
    }
    assert_eq!(
        server.review_reason.as_deref(),
        Some("never calls listen; no error handler")
    );
    assert!(!server.needs_review);
    assert!(registry.get("routes/api.js").unwrap().is_done(Phase::PseudoVerify));
}

#[tokio::test]
async fn test_unparsable_batch_answer_leaves_batch_unresolved() {
    let dir = TempDir::new().unwrap();
    let registry_store = seed(
        &dir,
        &[("server.js", &[Phase::PseudoGen]), ("routes/api.js", &[Phase::PseudoGen])],
    );
    let store = pseudo_store();
    let agent = ScriptedAgent::new().with_batch_answer("I could not review these files.");
    let settings = StackforgeToml::default().pipeline.with_max_retries(3);
    let executor = PhaseExecutor::new(&agent, &store, &registry_store, &settings);

    let batch = Batch {
        files: registry_store.load().tracked(),
    };
    let outcome = executor
        .verify_pseudocode_batch(&batch, PLAN, "")
        .await
        .unwrap();

    assert_eq!(agent.calls("verify_batch"), 3);
    assert!(outcome.unresolved.is_some());
    assert!(outcome.passed.is_empty());
    let registry = registry_store.load();
    for path in ["server.js", "routes/api.js"] {
        let record = registry.get(path).unwrap();
        assert!(record.is_done(Phase::PseudoGen));
        assert!(!record.is_done(Phase::PseudoVerify));
    }
}

#[tokio::test]
async fn test_unresolved_batch_is_reported() {
    let (_dir, config) = project("[pipeline]\nmax_retries = 2\nmax_passes = 1\n");
    let agent = ScriptedAgent::new().with_batch_answer("Everything seems fine to me.");
    let store = store_for(&config);

    let report = Pipeline::new(&config, &agent, &store)
        .run(DESCRIPTION)
        .await
        .unwrap();

    assert_eq!(agent.calls("verify_batch"), 2);
    assert_eq!(report.unresolved_batches.len(), 1);
    assert_eq!(report.unresolved_batches[0].files.len(), 3);
    assert_eq!(agent.calls("code:server.js"), 0);
    assert!(!report.succeeded());
}

#[tokio::test]
async fn test_failing_agent_exhausts_generation_retries() {
    let dir = TempDir::new().unwrap();
    let registry_store = seed(
        &dir,
        &[
            ("server.js", &[]),
            ("routes/api.js", &[Phase::PseudoGen, Phase::PseudoVerify]),
        ],
    );
    let store = pseudo_store();
    let agent = ScriptedAgent::new().with_broken_generation();
    let settings = StackforgeToml::default().pipeline.with_max_retries(3);
    let executor = PhaseExecutor::new(&agent, &store, &registry_store, &settings);
    let files = registry_store.load().tracked();

    let outcome = executor
        .generate_pseudocode(&files[0], RunInputs::default())
        .await
        .unwrap();
    assert!(matches!(outcome, FileOutcome::Failed { attempts: 3, .. }));
    assert_eq!(agent.calls("pseudo:server.js"), 3);

    let outcome = executor
        .generate_code(&files[1], RunInputs::default())
        .await
        .unwrap();
    match outcome {
        FileOutcome::Failed { attempts, reason } => {
            assert_eq!(attempts, 3);
            assert!(reason.contains("empty response"), "{reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(agent.calls("code:routes/api.js"), 3);

    let registry = registry_store.load();
    assert!(!registry.get("server.js").unwrap().is_done(Phase::PseudoGen));
    assert!(!registry.get("routes/api.js").unwrap().is_done(Phase::CodeGen));
}

#[tokio::test]
async fn test_files_missing_from_verdict_stay_unverified() {
    let dir = TempDir::new().unwrap();
    let registry_store = seed(
        &dir,
        &[("server.js", &[Phase::PseudoGen]), ("routes/api.js", &[Phase::PseudoGen])],
    );
    let store = pseudo_store();
    let agent = ScriptedAgent::new().with_batch_answer(r#"{"server.js": {"pass": true}}"#);
    let settings = StackforgeToml::default().pipeline;
    let executor = PhaseExecutor::new(&agent, &store, &registry_store, &settings);

    let batch = Batch {
        files: registry_store.load().tracked(),
    };
    let outcome = executor
        .verify_pseudocode_batch(&batch, PLAN, "")
        .await
        .unwrap();

    assert_eq!(outcome.passed, vec!["server.js".to_string()]);
    assert_eq!(outcome.unverdicted, vec!["routes/api.js".to_string()]);
    assert!(outcome.unresolved.is_none());
    let registry = registry_store.load();
    let routes = registry.get("routes/api.js").unwrap();
    assert!(routes.is_done(Phase::PseudoGen));
    assert!(!routes.is_done(Phase::PseudoVerify));
    assert!(routes.review_reason.is_none());
}

#[tokio::test]
async fn test_batch_pass_is_refused_without_pseudocode_flag() {
    let dir = TempDir::new().unwrap();
    let registry_store = seed(&dir, &[("server.js", &[])]);
    let store = pseudo_store();
    let agent = ScriptedAgent::new();
    let settings = StackforgeToml::default().pipeline;
    let executor = PhaseExecutor::new(&agent, &store, &registry_store, &settings);

    let batch = Batch {
        files: registry_store.load().tracked(),
    };
    let outcome = executor
        .verify_pseudocode_batch(&batch, PLAN, "")
        .await
        .unwrap();

    assert!(outcome.passed.is_empty());
    assert_eq!(outcome.refused, vec!["server.js".to_string()]);
    assert!(!registry_store.load().get("server.js").unwrap().is_done(Phase::PseudoVerify));
}

#[tokio::test]
async fn test_code_pass_is_refused_without_code_flag() {
    let dir = TempDir::new().unwrap();
    let registry_store = seed(&dir, &[("server.js", &[Phase::PseudoGen, Phase::PseudoVerify])]);
    let store = pseudo_store().with(
        ArtifactKind::Code,
        "server.js",
        "const app = require('express')();\napp.listen(3000);\n",
    );
    let agent = ScriptedAgent::new();
    let settings = StackforgeToml::default().pipeline;
    let executor = PhaseExecutor::new(&agent, &store, &registry_store, &settings);
    let files = registry_store.load().tracked();

    let outcome = executor
        .verify_code(&files[0], RunInputs::default())
        .await
        .unwrap();

    assert_eq!(agent.calls("review:server.js"), 1);
    match outcome {
        FileOutcome::Failed { reason, .. } => assert!(reason.contains("could not be recorded")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!registry_store.load().get("server.js").unwrap().is_done(Phase::CodeVerify));
}

#[tokio::test]
async fn test_collect_ignores_files_outside_the_registry() {
    let (_dir, config) = project("");
    std::fs::create_dir_all(config.output_dir.join("old")).unwrap();
    std::fs::write(config.output_dir.join("old/legacy.js"), "module.exports = 1;\n").unwrap();
    let agent = ScriptedAgent::new();
    let store = store_for(&config);

    let report = Pipeline::new(&config, &agent, &store)
        .run(DESCRIPTION)
        .await
        .unwrap();

    assert_eq!(report.output_files, 3);
    let manifest = std::fs::read_to_string(config.output_dir.join("manifest.json")).unwrap();
    assert!(manifest.contains("server.js"));
    assert!(!manifest.contains("legacy.js"));
    assert!(config.output_dir.join("old/legacy.js").exists());
}
