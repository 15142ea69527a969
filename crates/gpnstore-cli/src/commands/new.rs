//! `new` command - create an empty node file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use gpnstore_core::config::NodeConfig;
use gpnstore_core::Node;
use tracing::info;

use crate::GlobalOptions;

/// Arguments for the `new` command.
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Path of the node file to create
    path: PathBuf,
}

pub fn execute(args: NewArgs, global: &GlobalOptions) -> Result<()> {
    let path = &args.path;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        anyhow::bail!("parent directory {} does not exist", parent.display());
    }

    let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if basename.trim().is_empty() {
        anyhow::bail!("node file name cannot be blank");
    }

    if path.exists() {
        info!(path = %path.display(), "new: node already exists, cancelling");
        if !global.quiet {
            println!(
                "A node already exists at {}; nothing to do.",
                path.display()
            );
        }
        std::process::exit(1);
    }

    Node::create(path, &NodeConfig::default()).context("failed to create node")?;
    info!(path = %path.display(), "new: created node");
    if !global.quiet {
        println!("Created node at {}", path.display());
    }
    Ok(())
}
