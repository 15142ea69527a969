//! `inspect` command - print a read-only summary of a node.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gpnstore_core::config::NodeConfig;
use gpnstore_core::Node;

use crate::GlobalOptions;

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the node file to inspect
    node: PathBuf,
}

pub fn execute(args: InspectArgs, _global: &GlobalOptions) -> Result<()> {
    let node = Node::open_read_only(&args.node, &NodeConfig::default())
        .with_context(|| format!("failed to open node {}", args.node.display()))?;

    println!("unique id:        {}", node.unique_id()?);
    println!("schema version:   {}", node.schema_version()?);
    println!(
        "content hash:     {}",
        node.content_hash()?.as_deref().unwrap_or("absent")
    );
    println!("hierarchy levels: {}", node.hierarchy_names()?.join(", "));
    println!("cell count:       {}", node.cell_count()?);
    Ok(())
}
