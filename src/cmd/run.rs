//! `stackforge run`: drive the full pipeline.

use anyhow::{Context, Result, bail};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Cli;

pub async fn cmd_run(
    cli: &Cli,
    project_dir: PathBuf,
    description: Option<&str>,
    description_file: Option<&Path>,
    resume: bool,
) -> Result<()> {
    use stackforge::agents::CommandAgent;
    use stackforge::config::Config;
    use stackforge::orchestrator::Pipeline;
    use stackforge::storage::FsArtifactStore;
    use stackforge::ui::PipelineUI;

    let description = if resume {
        None
    } else {
        Some(read_description(description, description_file)?)
    };

    let config = Config::new(project_dir, cli.verbose, cli.overrides())?;
    for warning in config.settings().validate() {
        eprintln!("{} {}", style("warning:").yellow(), warning);
    }

    let settings = config.settings();
    let agent = CommandAgent::from_section(
        settings.agent_command(),
        settings.agent(),
        config.project_dir.clone(),
    );
    let store = FsArtifactStore::new(&config.pseudo_dir, &config.output_dir);
    let ui = Arc::new(PipelineUI::new(cli.verbose));
    let pipeline = Pipeline::new(&config, &agent, &store).with_ui(ui);

    let report = match description {
        Some(description) => pipeline.run(&description).await?,
        None => pipeline.resume().await?,
    };

    if !report.succeeded() {
        println!();
        println!(
            "{} files still need work. Run `stackforge run --resume` to continue.",
            report.status.total - report.status.code_verified
        );
    }
    Ok(())
}

fn read_description(inline: Option<&str>, file: Option<&Path>) -> Result<String> {
    match (inline, file) {
        (Some(text), _) => Ok(text.to_string()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read description file: {}", path.display())),
        (None, None) => {
            bail!("No application description: pass --description, --description-file or --resume")
        }
    }
}
