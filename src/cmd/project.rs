//! Project setup and inspection: `init`, `status`, `reset`.

use anyhow::Result;
use console::style;
use std::path::Path;

use crate::Cli;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    use stackforge::init::init_project;

    let result = init_project(project_dir)?;

    if result.created {
        println!(
            "Initialized stackforge project at {}",
            result.state_dir.display()
        );
        println!();
        println!("Created directory structure:");
        println!("  .stackforge/");
        println!("  ├── stackforge.toml    # Configuration (see `stackforge config show`)");
        println!("  ├── working/");
        println!("  │   └── pseudo_files/  # Pseudocode artifacts");
        println!("  └── runs/              # Run reports");
        println!();
        println!("Next steps:");
        println!("  1. Adjust [agent] and [pipeline] in stackforge.toml if needed");
        println!("  2. Run `stackforge run --description \"...\"` to generate an application");
    } else {
        println!(
            "Stackforge project already initialized at {}",
            result.state_dir.display()
        );
        println!("Directory structure verified.");
    }
    Ok(())
}

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use stackforge::config::Config;
    use stackforge::init::is_initialized;
    use stackforge::phase::Phase;
    use stackforge::registry::RegistryStore;
    use stackforge::report::{RunReport, list_runs};
    use stackforge::settings::CliOverrides;

    println!();
    println!("Stackforge Project Status");
    println!("=========================");
    println!();

    if !is_initialized(project_dir) {
        println!("Project: Not initialized");
        println!();
        println!("Run 'stackforge init' to initialize the project.");
        println!();
        return Ok(());
    }

    let config = Config::new(project_dir.to_path_buf(), false, CliOverrides::default())?;
    println!("Project: Initialized");
    println!(
        "Plan:    {}",
        if config.plan_file.exists() {
            "Ready"
        } else {
            "Missing (run 'stackforge run')"
        }
    );

    let registry = RegistryStore::new(config.registry_file.clone()).load();
    if registry.is_empty() {
        println!("Files:   none tracked");
        println!();
        return Ok(());
    }

    let status = registry.status();
    println!("Files:   {}", status.total);
    println!();
    for phase in Phase::ALL {
        let done = status.count(phase);
        let count = if done == status.total {
            style(format!("{done}/{}", status.total)).green()
        } else {
            style(format!("{done}/{}", status.total)).yellow()
        };
        println!("  {:<14} {}", phase.to_string(), count);
    }

    let review = registry.needs_review();
    if !review.is_empty() {
        println!();
        println!("Needs review ({}):", review.len());
        for file in review {
            let reason = file.record.review_reason.as_deref().unwrap_or("");
            let first_line = reason.lines().next().unwrap_or("");
            println!("  {} {}", style(&file.path).yellow(), style(first_line).dim());
        }
    }

    if let Some(latest) = list_runs(&config.runs_dir)?.first()
        && let Ok(report) = RunReport::load(latest)
    {
        println!();
        println!(
            "Last run: {} (stage: {}, {} passes, {} failures, {} escalations)",
            report.started_at.format("%Y-%m-%d %H:%M:%S"),
            report.stage,
            report.passes,
            report.failures.len(),
            report.escalations.len()
        );
        if let Some(error) = &report.error {
            println!("  {}", style(error).red());
        }
    }
    println!();
    Ok(())
}

pub fn cmd_reset(cli: &Cli, project_dir: &Path, force: bool) -> Result<()> {
    use dialoguer::Confirm;
    use stackforge::config::Config;
    use stackforge::init::is_initialized;

    if !is_initialized(project_dir) {
        println!("Nothing to reset: project not initialized");
        return Ok(());
    }
    let config = Config::new(project_dir.to_path_buf(), cli.verbose, cli.overrides())?;

    if !force {
        let confirm = Confirm::new()
            .with_prompt("This will discard the plan, registry and pseudocode. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    if config.work_dir.exists() {
        std::fs::remove_dir_all(&config.work_dir)?;
    }
    std::fs::create_dir_all(&config.pseudo_dir)?;

    println!("Reset complete");
    Ok(())
}
