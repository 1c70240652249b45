use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stackforge::config::STATE_DIR;
use stackforge::settings::CliOverrides;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "stackforge")]
#[command(version, about = "Agentic code-generation pipeline: plan, pseudocode, code, verify")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Files per pseudocode verification batch. Overrides stackforge.toml.
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Attempts per file and phase. Overrides stackforge.toml.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Pseudocode + code passes per run. Overrides stackforge.toml.
    #[arg(long, global = true)]
    pub max_passes: Option<u32>,

    /// Where generated files are written. Overrides stackforge.toml.
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            max_passes: self.max_passes,
            output_dir: self.output_dir.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new stackforge project
    Init,
    /// Generate an application from a description
    Run {
        /// Application description
        #[arg(short, long, conflicts_with = "description_file")]
        description: Option<String>,

        /// Read the application description from a file
        #[arg(long)]
        description_file: Option<PathBuf>,

        /// Continue from the stored plan and registry
        #[arg(long, conflicts_with_all = ["description", "description_file"])]
        resume: bool,
    },
    /// Show per-phase progress of the current registry
    Status,
    /// Show how files would be batched for pseudocode verification
    Batches {
        /// Group by file type instead of dependency order
        #[arg(long)]
        no_graph: bool,
    },
    /// Show the dependency graph extracted from pseudocode
    Graph,
    /// Discard the plan, registry and pseudocode
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default stackforge.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let log_file = matches!(cli.command, Commands::Run { .. })
        .then(|| project_dir.join(STATE_DIR).join("working").join("generation.log"));
    let _log_guard = stackforge::logging::init(cli.verbose, log_file.as_deref());

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Run {
            description,
            description_file,
            resume,
        } => {
            cmd::cmd_run(
                &cli,
                project_dir,
                description.as_deref(),
                description_file.as_deref(),
                *resume,
            )
            .await?
        }
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Batches { no_graph } => cmd::cmd_batches(&cli, &project_dir, *no_graph)?,
        Commands::Graph => cmd::cmd_graph(&cli, &project_dir)?,
        Commands::Reset { force } => cmd::cmd_reset(&cli, &project_dir, *force)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
