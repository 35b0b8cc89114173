use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "node-factory",
    about = "node-factory: a shared tree of factory and number nodes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Print every node stored in a log
    Dump(DataArgs),
    /// Print the expanded tree stored in a log
    Tree(DataArgs),
    /// Rewrite a log so it holds only live nodes
    Compact(DataArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Listen address, overriding the configuration
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Log store path, overriding the configuration
    #[arg(long)]
    pub data: Option<PathBuf>,
}

#[derive(Args)]
pub struct DataArgs {
    /// Path of the node log
    #[arg(long)]
    pub data: PathBuf,
}
