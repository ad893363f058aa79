use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "shelf",
    about = "Inspect and maintain a shelf bookmark and archive store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory; overrides the one in the configuration file
    #[arg(long, global = true)]
    pub data_path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Report whether the store has been initialized
    Status,
    /// Show the node log header
    Info,
    /// Report orphaned object directories and dangling parents
    Audit,
    /// List object directories with no node, optionally deleting them
    Orphans(OrphansArgs),
    /// Rebuild the node log from the item mirrors
    RebuildIndex,
    /// Delete the node log and every object directory
    Wipe(WipeArgs),
    /// Compute a sync plan for a client snapshot
    Sync(SyncArgs),
    /// Assemble pull payloads for a list of sync nodes
    Pull(PullArgs),
}

#[derive(Args)]
pub struct OrphansArgs {
    #[arg(long)]
    pub delete: bool,
}

#[derive(Args)]
pub struct WipeArgs {
    /// Required; wiping cannot be undone
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    /// JSON file holding the client's list of sync nodes
    pub snapshot: PathBuf,
    /// Time of the last successful sync, in milliseconds since the epoch
    #[arg(long, default_value = "0")]
    pub last_sync: i64,
    /// Treat storage as canonical regardless of configuration
    #[arg(long)]
    pub pull_only: bool,
}

#[derive(Args)]
pub struct PullArgs {
    /// JSON file holding the sync nodes to fetch (usually a plan's `pull` list)
    pub nodes: PathBuf,
}
