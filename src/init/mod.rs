//! `stackforge init`: create the project state directory.
//!
//! ```text
//! .stackforge/
//! ├── stackforge.toml      # Configuration
//! ├── working/
//! │   └── pseudo_files/    # Pseudocode artifacts
//! └── runs/                # Run reports
//! ```

use crate::config::STATE_DIR;
use crate::settings::{CONFIG_FILE, StackforgeToml};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Result of initializing a project.
#[derive(Debug)]
pub struct InitResult {
    pub state_dir: PathBuf,
    /// False when the directory already existed
    pub created: bool,
}

pub fn get_state_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(STATE_DIR)
}

pub fn is_initialized(project_dir: &Path) -> bool {
    get_state_dir(project_dir).exists()
}

/// Create (or complete) the `.stackforge/` structure. Existing files are kept.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let state_dir = get_state_dir(project_dir);
    let created = !state_dir.exists();

    for dir in [
        state_dir.clone(),
        state_dir.join("working").join("pseudo_files"),
        state_dir.join("runs"),
    ] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let config_file = state_dir.join(CONFIG_FILE);
    if !config_file.exists() {
        let mut toml = StackforgeToml::default();
        toml.project.name = project_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string());
        toml.save(&config_file)?;
    }

    Ok(InitResult { state_dir, created })
}
