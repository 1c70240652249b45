//! Layered configuration read from `.stackforge/stackforge.toml`.
//!
//! Values resolve file → environment → CLI, every field has a default, and a
//! missing file is equivalent to an empty one.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "todo-app"
//!
//! [agent]
//! command = "claude"
//! args = ["--print"]
//! reasoning_model = "opus"
//! coding_model = "sonnet"
//!
//! [pipeline]
//! max_retries = 3
//! max_regens_per_file = 5
//! batch_size = 5
//! max_plan_attempts = 3
//! max_passes = 2
//! min_content_chars = 50
//! pseudo_marker = "BEGIN FILE"
//! dependency_batching = true
//! inject_minimum_files = true
//!
//! [paths]
//! output_dir = "output"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the configuration inside the state directory.
pub const CONFIG_FILE: &str = "stackforge.toml";

/// Environment variable overriding the agent command.
pub const AGENT_CMD_ENV: &str = "STACKFORGE_AGENT_CMD";

/// Project-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Project name (optional, defaults to directory name)
    #[serde(default)]
    pub name: Option<String>,
}

/// How the agent CLI is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Agent CLI command (default: "claude")
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments passed before the model flag
    #[serde(default = "default_agent_args")]
    pub args: Vec<String>,
    /// Model used for planning, pseudocode and verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_model: Option<String>,
    /// Model used for source generation and code review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_model: Option<String>,
}

fn default_agent_args() -> Vec<String> {
    vec!["--print".to_string()]
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            command: None,
            args: default_agent_args(),
            reasoning_model: None,
            coding_model: None,
        }
    }
}

/// Retry budgets and batching knobs for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Global attempt cap per file and phase
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Quality-rejection / regeneration cap per file
    #[serde(default = "default_max_regens_per_file")]
    pub max_regens_per_file: u32,
    /// Files per pseudocode verification batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Plan validations before giving up
    #[serde(default = "default_max_plan_attempts")]
    pub max_plan_attempts: u32,
    /// PseudoLoop + CodeLoop repetitions per run
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,
    /// Shortest acceptable generated artifact
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    /// Marker every pseudocode artifact must contain
    #[serde(default = "default_pseudo_marker")]
    pub pseudo_marker: String,
    /// Order verification batches by the import graph instead of file type
    #[serde(default = "default_true")]
    pub dependency_batching: bool,
    /// Insert a manifest and server entry when the plan omits them
    #[serde(default = "default_true")]
    pub inject_minimum_files: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_regens_per_file() -> u32 {
    5
}

fn default_batch_size() -> usize {
    5
}

fn default_max_plan_attempts() -> u32 {
    3
}

fn default_max_passes() -> u32 {
    2
}

fn default_min_content_chars() -> usize {
    50
}

fn default_pseudo_marker() -> String {
    "BEGIN FILE".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_regens_per_file: default_max_regens_per_file(),
            batch_size: default_batch_size(),
            max_plan_attempts: default_max_plan_attempts(),
            max_passes: default_max_passes(),
            min_content_chars: default_min_content_chars(),
            pseudo_marker: default_pseudo_marker(),
            dependency_batching: true,
            inject_minimum_files: true,
        }
    }
}

impl PipelineSettings {
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_max_regens(mut self, max: u32) -> Self {
        self.max_regens_per_file = max;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_max_passes(mut self, passes: u32) -> Self {
        self.max_passes = passes;
        self
    }

    pub fn with_dependency_batching(mut self, enabled: bool) -> Self {
        self.dependency_batching = enabled;
        self
    }

    pub fn with_inject_minimum_files(mut self, enabled: bool) -> Self {
        self.inject_minimum_files = enabled;
        self
    }
}

/// Filesystem locations relative to the project directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    /// Root that generated source files are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_output_dir() -> String {
    "output".to_string()
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// The complete stackforge.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackforgeToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub paths: PathsSection,
}

impl StackforgeToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse stackforge.toml")
    }

    /// Load from `<state_dir>/stackforge.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(state_dir: &Path) -> Result<Self> {
        let config_path = state_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize stackforge.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Agent command, with fallback to the environment.
    pub fn agent_command(&self) -> String {
        self.agent
            .command
            .clone()
            .or_else(|| std::env::var(AGENT_CMD_ENV).ok())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// Return human-readable warnings for suspicious values.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let p = &self.pipeline;
        if p.max_retries == 0 {
            warnings.push("pipeline.max_retries is 0: no generation will ever be attempted".into());
        }
        if p.batch_size == 0 {
            warnings.push("pipeline.batch_size is 0: batches will hold a single file".into());
        }
        if p.max_plan_attempts == 0 {
            warnings.push("pipeline.max_plan_attempts is 0: treated as a single validation".into());
        }
        if p.max_passes == 0 {
            warnings.push("pipeline.max_passes is 0: treated as a single pass".into());
        }
        if p.max_regens_per_file < p.max_retries {
            warnings.push(format!(
                "pipeline.max_regens_per_file ({}) is below max_retries ({}): quality rejections end generation early",
                p.max_regens_per_file, p.max_retries
            ));
        }
        if p.pseudo_marker.trim().is_empty() {
            warnings.push("pipeline.pseudo_marker is empty: any text passes as pseudocode".into());
        }
        if self.paths.output_dir.trim().is_empty() {
            warnings.push("paths.output_dir is empty".into());
        }
        warnings
    }
}

/// Values supplied on the command line, applied over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub batch_size: Option<usize>,
    pub max_retries: Option<u32>,
    pub max_passes: Option<u32>,
    pub output_dir: Option<PathBuf>,
}

/// Effective settings for a project: file, then environment, then CLI.
#[derive(Debug, Clone)]
pub struct Settings {
    project_dir: PathBuf,
    toml: StackforgeToml,
    overrides: CliOverrides,
}

impl Settings {
    /// Load settings for a project directory.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let state_dir = project_dir.join(crate::config::STATE_DIR);
        let toml = StackforgeToml::load_or_default(&state_dir)?;
        Ok(Self {
            project_dir,
            toml,
            overrides: CliOverrides::default(),
        })
    }

    /// Build settings from an already parsed file.
    pub fn from_toml(project_dir: PathBuf, toml: StackforgeToml) -> Self {
        Self {
            project_dir,
            toml,
            overrides: CliOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: CliOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn toml(&self) -> &StackforgeToml {
        &self.toml
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn agent(&self) -> &AgentSection {
        &self.toml.agent
    }

    pub fn agent_command(&self) -> String {
        self.toml.agent_command()
    }

    /// Pipeline settings with CLI overrides applied.
    pub fn pipeline(&self) -> PipelineSettings {
        let mut pipeline = self.toml.pipeline.clone();
        if let Some(size) = self.overrides.batch_size {
            pipeline.batch_size = size;
        }
        if let Some(retries) = self.overrides.max_retries {
            pipeline.max_retries = retries;
        }
        if let Some(passes) = self.overrides.max_passes {
            pipeline.max_passes = passes;
        }
        pipeline
    }

    /// Output root, resolved against the project directory when relative.
    pub fn output_dir(&self) -> PathBuf {
        let configured = self
            .overrides
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.toml.paths.output_dir));
        if configured.is_absolute() {
            configured
        } else {
            self.project_dir.join(configured)
        }
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_empty_gives_defaults() {
        let toml = StackforgeToml::parse("").unwrap();
        assert_eq!(toml.pipeline, PipelineSettings::default());
        assert_eq!(toml.pipeline.max_retries, 3);
        assert_eq!(toml.pipeline.max_regens_per_file, 5);
        assert_eq!(toml.pipeline.batch_size, 5);
        assert_eq!(toml.pipeline.max_plan_attempts, 3);
        assert_eq!(toml.pipeline.min_content_chars, 50);
        assert_eq!(toml.pipeline.pseudo_marker, "BEGIN FILE");
        assert_eq!(toml.agent.args, vec!["--print"]);
        assert_eq!(toml.paths.output_dir, "output");
    }

    #[test]
    fn test_parse_partial_pipeline_section() {
        let toml = StackforgeToml::parse(
            r#"
[pipeline]
batch_size = 2
dependency_batching = false
"#,
        )
        .unwrap();
        assert_eq!(toml.pipeline.batch_size, 2);
        assert!(!toml.pipeline.dependency_batching);
        assert_eq!(toml.pipeline.max_retries, 3);
        assert!(toml.pipeline.inject_minimum_files);
    }

    #[test]
    fn test_parse_agent_section() {
        let toml = StackforgeToml::parse(
            r#"
[agent]
command = "my-agent"
args = ["--print", "--quiet"]
coding_model = "sonnet"
"#,
        )
        .unwrap();
        assert_eq!(toml.agent_command(), "my-agent");
        assert_eq!(toml.agent.args.len(), 2);
        assert_eq!(toml.agent.coding_model.as_deref(), Some("sonnet"));
        assert!(toml.agent.reasoning_model.is_none());
    }

    #[test]
    fn test_parse_invalid_toml_errors() {
        let result = StackforgeToml::parse("[pipeline\nbatch_size = ");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_and_save_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut toml = StackforgeToml::default();
        toml.project.name = Some("shop".to_string());
        toml.pipeline.batch_size = 7;
        toml.save(&path).unwrap();

        let loaded = StackforgeToml::load(&path).unwrap();
        assert_eq!(loaded.project.name.as_deref(), Some("shop"));
        assert_eq!(loaded.pipeline.batch_size, 7);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let toml = StackforgeToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.pipeline.max_passes, 2);
    }

    #[test]
    fn test_validate_defaults_clean() {
        assert!(StackforgeToml::default().validate().is_empty());
    }

    #[test]
    fn test_validate_flags_zero_values() {
        let mut toml = StackforgeToml::default();
        toml.pipeline.batch_size = 0;
        toml.pipeline.max_retries = 0;
        let warnings = toml.validate();
        assert!(warnings.iter().any(|w| w.contains("batch_size")));
        assert!(warnings.iter().any(|w| w.contains("max_retries")));
    }

    #[test]
    fn test_cli_overrides_win() {
        let dir = tempdir().unwrap();
        let settings = Settings::from_toml(dir.path().to_path_buf(), StackforgeToml::default())
            .with_overrides(CliOverrides {
                batch_size: Some(1),
                max_retries: Some(9),
                max_passes: None,
                output_dir: Some(PathBuf::from("dist")),
            });
        let pipeline = settings.pipeline();
        assert_eq!(pipeline.batch_size, 1);
        assert_eq!(pipeline.max_retries, 9);
        assert_eq!(pipeline.max_passes, 2);
        assert_eq!(settings.output_dir(), dir.path().join("dist"));
    }

    #[test]
    fn test_output_dir_absolute_kept() {
        let dir = tempdir().unwrap();
        let mut toml = StackforgeToml::default();
        toml.paths.output_dir = dir.path().join("abs").display().to_string();
        let settings = Settings::from_toml(PathBuf::from("/somewhere"), toml);
        assert_eq!(settings.output_dir(), dir.path().join("abs"));
    }
}
