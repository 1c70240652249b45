//! Configuration view and validation commands: `stackforge config`.

use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;
use stackforge::settings::{CONFIG_FILE, Settings, StackforgeToml};

fn print_toml(toml: &StackforgeToml) {
    if let Some(name) = &toml.project.name {
        println!("[project]");
        println!("  name = \"{}\"", name);
        println!();
    }

    println!("[agent]");
    if let Some(command) = &toml.agent.command {
        println!("  command = \"{}\"", command);
    }
    println!("  args = {:?}", toml.agent.args);
    if let Some(model) = &toml.agent.reasoning_model {
        println!("  reasoning_model = \"{}\"", model);
    }
    if let Some(model) = &toml.agent.coding_model {
        println!("  coding_model = \"{}\"", model);
    }
    println!();

    let p = &toml.pipeline;
    println!("[pipeline]");
    println!("  max_retries = {}", p.max_retries);
    println!("  max_regens_per_file = {}", p.max_regens_per_file);
    println!("  batch_size = {}", p.batch_size);
    println!("  max_plan_attempts = {}", p.max_plan_attempts);
    println!("  max_passes = {}", p.max_passes);
    println!("  min_content_chars = {}", p.min_content_chars);
    println!("  pseudo_marker = \"{}\"", p.pseudo_marker);
    println!("  dependency_batching = {}", p.dependency_batching);
    println!("  inject_minimum_files = {}", p.inject_minimum_files);
    println!();

    println!("[paths]");
    println!("  output_dir = \"{}\"", toml.paths.output_dir);
    println!();
}

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    use stackforge::init::get_state_dir;

    let state_dir = get_state_dir(project_dir);
    let config_path = state_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Stackforge Configuration");
            println!("========================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                print_toml(&StackforgeToml::load(&config_path)?);
            } else {
                println!("No stackforge.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                print_toml(&StackforgeToml::default());
                println!("Run 'stackforge config init' to create a stackforge.toml file.");
                println!();
            }

            let settings = Settings::new(project_dir.to_path_buf())?;
            println!("Effective values (with env overrides):");
            println!("  agent command = \"{}\"", settings.agent_command());
            println!("  output dir = \"{}\"", settings.output_dir().display());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No stackforge.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = StackforgeToml::load(&config_path)?.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("stackforge.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&state_dir)?;
            StackforgeToml::default().save(&config_path)?;

            println!("Created stackforge.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [agent] command, args, reasoning_model, coding_model");
            println!("  - [pipeline] retry budgets, batch_size, max_passes");
            println!("  - [paths] output_dir");
            println!();
        }
    }

    Ok(())
}
