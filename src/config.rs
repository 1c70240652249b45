use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::settings::{CONFIG_FILE, CliOverrides, PipelineSettings, Settings};

/// Name of the per-project state directory.
pub const STATE_DIR: &str = ".stackforge";

/// Runtime configuration for a stackforge project.
///
/// Resolves every on-disk location the pipeline touches and carries the
/// layered [`Settings`].
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub state_dir: PathBuf,
    pub config_file: PathBuf,
    pub work_dir: PathBuf,
    pub pseudo_dir: PathBuf,
    pub output_dir: PathBuf,
    pub registry_file: PathBuf,
    pub plan_file: PathBuf,
    pub packages_file: PathBuf,
    pub summary_file: PathBuf,
    pub log_file: PathBuf,
    pub runs_dir: PathBuf,
    pub verbose: bool,
    settings: Settings,
}

impl Config {
    pub fn new(project_dir: PathBuf, verbose: bool, overrides: CliOverrides) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let settings = Settings::new(project_dir.clone())?.with_overrides(overrides);
        Ok(Self::from_settings(project_dir, verbose, settings))
    }

    /// Build a config from explicit settings without touching the filesystem.
    pub fn from_settings(project_dir: PathBuf, verbose: bool, settings: Settings) -> Self {
        let state_dir = project_dir.join(STATE_DIR);
        let work_dir = state_dir.join("working");
        let pseudo_dir = work_dir.join("pseudo_files");
        Self {
            config_file: state_dir.join(CONFIG_FILE),
            registry_file: work_dir.join("files.json"),
            plan_file: work_dir.join("plan.txt"),
            packages_file: work_dir.join("dependencies.json"),
            summary_file: pseudo_dir.join("dependency_summary.txt"),
            log_file: work_dir.join("generation.log"),
            runs_dir: state_dir.join("runs"),
            output_dir: settings.output_dir(),
            project_dir,
            state_dir,
            work_dir,
            pseudo_dir,
            verbose,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pipeline(&self) -> PipelineSettings {
        self.settings.pipeline()
    }

    pub fn is_initialized(&self) -> bool {
        self.state_dir.exists()
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.state_dir,
            &self.work_dir,
            &self.pseudo_dir,
            &self.runs_dir,
            &self.output_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// Relative display of a path under the project directory.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.project_dir).unwrap_or(path)
    }
}
