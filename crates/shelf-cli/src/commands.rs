use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;

use shelf_store::{MetadataProbe, ObjectStore, StoreConfig, StoreStatus};
use shelf_sync::{SyncDirection, SyncEngine};
use shelf_types::SyncNode;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli.config.as_deref(), cli.data_path.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Status => cmd_status(&ObjectStore::new(config), format),
        Command::Info => cmd_info(&ObjectStore::new(config), format),
        Command::Audit => cmd_audit(&ObjectStore::new(config), format),
        Command::Orphans(args) => cmd_orphans(&ObjectStore::new(config), args, format),
        Command::RebuildIndex => cmd_rebuild(&ObjectStore::new(config), format),
        Command::Wipe(args) => cmd_wipe(&ObjectStore::new(config), args),
        Command::Sync(args) => cmd_sync(config, args, format),
        Command::Pull(args) => cmd_pull(&ObjectStore::new(config), args),
    }
}

/// A configuration file when given, with `--data-path` taking precedence
/// over its data directory; otherwise defaults rooted at `--data-path`.
fn resolve_config(config: Option<&Path>, data_path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    match (config, data_path) {
        (Some(file), override_path) => {
            let mut config = StoreConfig::load(file)
                .with_context(|| format!("loading configuration from {}", file.display()))?;
            if let Some(path) = override_path {
                config.data_path = StoreConfig::new(path).data_path;
            }
            Ok(config)
        }
        (None, Some(path)) => Ok(StoreConfig::new(path)),
        (None, None) => bail!("either --config or --data-path is required"),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_sync_nodes(path: &Path) -> anyhow::Result<Vec<SyncNode>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing sync nodes in {}", path.display()))
}

fn cmd_status(store: &ObjectStore, format: OutputFormat) -> anyhow::Result<()> {
    let status = store.check_directory();
    if format == OutputFormat::Json {
        return print_json(&status);
    }
    match status {
        StoreStatus::Populated => println!(
            "{} store at {} is populated",
            "✓".green().bold(),
            store.config().data_path.display()
        ),
        StoreStatus::Empty => println!(
            "{} store at {} is empty",
            "∅".yellow().bold(),
            store.config().data_path.display()
        ),
    }
    Ok(())
}

fn cmd_info(store: &ObjectStore, format: OutputFormat) -> anyhow::Result<()> {
    let probe = store.get_metadata();
    if format == OutputFormat::Json {
        return print_json(&probe);
    }
    match probe {
        MetadataProbe::Header(header) => {
            println!("Format: {} v{}", header.format.bold(), header.version);
            println!("Generator: {}", header.generator);
            println!("Instance: {}", header.uuid.cyan());
            println!("Entities: {}", header.entities.to_string().bold());
            if let Some(date) = header.date {
                println!("Written: {}", date.dimmed());
            }
        }
        MetadataProbe::Empty => println!("No node log yet."),
        MetadataProbe::Error(message) => println!("{} {}", "error:".red().bold(), message),
    }
    Ok(())
}

fn cmd_audit(store: &ObjectStore, format: OutputFormat) -> anyhow::Result<()> {
    let report = store.audit()?;
    if format == OutputFormat::Json {
        return print_json(&report);
    }
    if report.is_consistent() {
        println!("{} No issues.", "✓".green().bold());
        return Ok(());
    }
    for uuid in &report.orphaned {
        println!("  {} {}", "orphaned:".yellow(), uuid);
    }
    for dangling in &report.dangling_parents {
        println!(
            "  {} {} → {}",
            "dangling:".red(),
            dangling.node,
            dangling.parent.to_string().dimmed()
        );
    }
    Ok(())
}

fn cmd_orphans(store: &ObjectStore, args: OrphansArgs, format: OutputFormat) -> anyhow::Result<()> {
    let orphans = if args.delete {
        store.delete_orphaned_items()?
    } else {
        store.get_orphaned_items()?
    };
    if format == OutputFormat::Json {
        return print_json(&orphans);
    }
    let label = if args.delete { "removed:" } else { "orphaned:" };
    for uuid in &orphans {
        println!("  {} {}", label.yellow(), uuid);
    }
    if orphans.is_empty() {
        println!("{} No orphaned items.", "✓".green());
    }
    Ok(())
}

fn cmd_rebuild(store: &ObjectStore, format: OutputFormat) -> anyhow::Result<()> {
    let nodes = store.rebuild_item_index()?;
    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({ "nodes": nodes }));
    }
    println!("{} Rebuilt node log with {} nodes.", "✓".green().bold(), nodes.to_string().bold());
    Ok(())
}

fn cmd_wipe(store: &ObjectStore, args: WipeArgs) -> anyhow::Result<()> {
    if !args.yes {
        bail!("refusing to wipe {} without --yes", store.config().data_path.display());
    }
    tracing::info!(path = %store.config().data_path.display(), "wiping store");
    store.wipe_storage();
    println!("{} Wiped {}.", "✓".green().bold(), store.config().data_path.display());
    Ok(())
}

fn cmd_sync(config: StoreConfig, args: SyncArgs, format: OutputFormat) -> anyhow::Result<()> {
    let incoming = read_sync_nodes(&args.snapshot)?;
    let direction = if args.pull_only {
        SyncDirection::PullOnly
    } else {
        config.sync_direction
    };
    let store = ObjectStore::new(config);
    let plan = SyncEngine::new(direction).compute(&store, &incoming, args.last_sync)?;

    if format == OutputFormat::Json {
        return print_json(&plan);
    }
    let rows = [
        ("push", &plan.push),
        ("pull", &plan.pull),
        ("delete", &plan.delete),
        ("delete in storage", &plan.delete_in_storage),
    ];
    for (label, nodes) in rows {
        println!("{}: {}", label.bold(), nodes.len());
        for node in nodes {
            let content = node.push_content.or(node.pull_content).unwrap_or(false);
            let marker = if content { " +content".cyan().to_string() } else { String::new() };
            println!("  {}{}", node.uuid, marker);
        }
    }
    Ok(())
}

fn cmd_pull(store: &ObjectStore, args: PullArgs) -> anyhow::Result<()> {
    let nodes = read_sync_nodes(&args.nodes)?;
    let payloads = SyncEngine::default().pull_objects(store, &nodes);
    print_json(&payloads)
}
