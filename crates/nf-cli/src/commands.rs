use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use nf_core::{NodeFactory, TreeCache};
use nf_server::{NodeFactoryServer, ServerConfig, StoreConfig};
use nf_store::{LogNodeStore, SyncMode};
use nf_types::{ExpandedNode, Node};
use serde_json::json;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Dump(args) => {
            print!("{}", dump_output(&args.data, format).await?);
            Ok(())
        }
        Command::Tree(args) => {
            print!("{}", tree_output(&args.data, format).await?);
            Ok(())
        }
        Command::Compact(args) => {
            print!("{}", compact_output(&args.data, format)?);
            Ok(())
        }
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(path) = args.data {
        let sync = match config.store {
            StoreConfig::Log { sync, .. } => sync,
            StoreConfig::Memory => SyncMode::default(),
        };
        config.store = StoreConfig::Log { path, sync };
    }

    let store = match &config.store {
        StoreConfig::Memory => "memory".to_string(),
        StoreConfig::Log { path, .. } => path.display().to_string(),
    };
    println!(
        "{} node-factory on {} ({}, store: {})",
        "▶".green().bold(),
        config.bind_addr.to_string().bold(),
        config.environment.to_string().yellow(),
        store
    );
    NodeFactoryServer::new(config)?.serve().await?;
    Ok(())
}

/// Open a log that must already exist.
fn open_existing(path: &Path) -> anyhow::Result<LogNodeStore> {
    if !path.is_file() {
        bail!("no node log at {}", path.display());
    }
    tracing::debug!(path = %path.display(), "opening node log");
    LogNodeStore::open(path, SyncMode::OsDefault)
        .with_context(|| format!("opening {}", path.display()))
}

fn open_factory(path: &Path) -> anyhow::Result<NodeFactory> {
    let store = open_existing(path)?;
    Ok(NodeFactory::with_store(
        Arc::new(store),
        TreeCache::with_default_capacity(),
    ))
}

fn node_line(node: &Node) -> String {
    format!(
        "{} {:<7} parent={} value={}",
        node.id.to_string().cyan(),
        node.node_type.to_string(),
        node.parent,
        node.value
    )
}

pub async fn dump_output(path: &Path, format: OutputFormat) -> anyhow::Result<String> {
    let factory = open_factory(path)?;
    let mut nodes = factory.get_all_nodes().await?;
    nodes.sort_by_key(|n| n.id);

    let mut out = String::new();
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&nodes)?)?;
        }
        OutputFormat::Text => {
            for node in &nodes {
                writeln!(out, "{}", node_line(node))?;
            }
            writeln!(out, "{} node(s)", nodes.len().to_string().bold())?;
        }
    }
    Ok(out)
}

fn render_tree(node: &ExpandedNode, depth: usize, out: &mut String) {
    let label = match node.value.as_str() {
        Some(s) => s.to_string(),
        None => node.value.to_string(),
    };
    let _ = writeln!(
        out,
        "{}{} ({}) {}",
        "  ".repeat(depth),
        label.bold(),
        node.node_type,
        node.id.to_string().dimmed()
    );
    for child in &node.children {
        render_tree(child, depth + 1, out);
    }
}

pub async fn tree_output(path: &Path, format: OutputFormat) -> anyhow::Result<String> {
    let factory = open_factory(path)?;
    let root = factory.get_expanded_root_node().await?;

    let mut out = String::new();
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&root)?)?;
        }
        OutputFormat::Text => render_tree(&root, 0, &mut out),
    }
    Ok(out)
}

pub fn compact_output(path: &Path, format: OutputFormat) -> anyhow::Result<String> {
    let store = open_existing(path)?;
    let before = store.offset();
    let live = store.compact()?;
    let after = store.offset();

    let out = match format {
        OutputFormat::Json => format!(
            "{}\n",
            json!({ "path": path, "nodes": live, "bytes_before": before, "bytes_after": after })
        ),
        OutputFormat::Text => format!(
            "{} Compacted {} to {} live node(s) ({} -> {} bytes)\n",
            "✓".green().bold(),
            path.display(),
            live.to_string().bold(),
            before,
            after
        ),
    };
    Ok(out)
}
