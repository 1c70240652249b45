//! Read-only views of the dependency subsystem: `batches`, `graph`.

use anyhow::{Result, bail};
use console::style;
use std::path::Path;

use crate::Cli;
use stackforge::config::Config;
use stackforge::registry::{Registry, RegistryStore};
use stackforge::storage::FsArtifactStore;

fn load(cli: &Cli, project_dir: &Path) -> Result<(Config, Registry)> {
    let config = Config::new(project_dir.to_path_buf(), cli.verbose, cli.overrides())?;
    let registry = RegistryStore::new(config.registry_file.clone()).load();
    if registry.is_empty() {
        bail!("No files tracked yet. Run 'stackforge run' first.");
    }
    Ok((config, registry))
}

pub fn cmd_batches(cli: &Cli, project_dir: &Path, no_graph: bool) -> Result<()> {
    use stackforge::dag::{GraphBuilder, plan_batches};

    let (config, registry) = load(cli, project_dir)?;
    let settings = config.pipeline();
    let store = FsArtifactStore::new(&config.pseudo_dir, &config.output_dir);

    let graph = (!no_graph && settings.dependency_batching)
        .then(|| GraphBuilder::new(&registry, &store).build());
    let files = registry.tracked();
    let (batches, strategy) = plan_batches(&files, settings.batch_size, graph.as_ref());

    println!();
    println!(
        "{} batches of up to {} files ({})",
        batches.len(),
        settings.batch_size.max(1),
        strategy
    );
    println!();
    for (index, batch) in batches.iter().enumerate() {
        println!("{}", style(format!("Batch {}", index + 1)).bold());
        for file in &batch.files {
            println!("  {:<9} {}", file.file_type().to_string(), file.path);
        }
    }
    println!();
    Ok(())
}

pub fn cmd_graph(cli: &Cli, project_dir: &Path) -> Result<()> {
    use stackforge::dag::GraphBuilder;
    use stackforge::dag::graph::connected_paths;

    let (config, registry) = load(cli, project_dir)?;
    let store = FsArtifactStore::new(&config.pseudo_dir, &config.output_dir);
    let graph = GraphBuilder::new(&registry, &store).build();

    println!();
    println!("{} files, {} dependencies", graph.len(), graph.edge_count());
    println!();
    for (dependency, dependent) in graph.edges() {
        println!("  {} {} {}", dependency, style("→").dim(), dependent);
    }

    let connected = connected_paths(&graph);
    let isolated: Vec<&str> = graph
        .nodes()
        .iter()
        .map(String::as_str)
        .filter(|path| !connected.contains(path))
        .collect();
    if !isolated.is_empty() {
        println!();
        println!("No dependencies found for:");
        for path in isolated {
            println!("  {}", style(path).dim());
        }
    }

    match graph.topological_order(graph.nodes()) {
        Ok(order) => {
            println!();
            println!("Verification order: {}", order.join(", "));
        }
        Err(cycle) => {
            println!();
            println!("{} {}", style("Cycle:").red(), cycle);
        }
    }
    println!();
    Ok(())
}
