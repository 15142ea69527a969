//! gpnstore - command-line front-end for local partition-network node files.
//!
//! # Usage
//!
//! ```bash
//! # Create an empty node
//! gpnstore new census.gpn
//!
//! # Bulk-load cells from a delimited file
//! gpnstore ingest census.gpn counties.csv
//!
//! # Inspect a node's summary
//! gpnstore inspect census.gpn
//! ```

use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// gpnstore - a local storage engine for granular partition networks
#[derive(Parser, Debug)]
#[command(name = "gpnstore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Enable verbose (debug-level) logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty node file
    New(commands::new::NewArgs),

    /// Bulk-load cells from a delimited file into a node
    Ingest(commands::ingest::IngestArgs),

    /// Print a read-only summary of a node
    Inspect(commands::inspect::InspectArgs),
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a tracing subscriber was already installed");
    }

    let result = match cli.command {
        Commands::New(args) => commands::new::execute(args, &cli.global),
        Commands::Ingest(args) => commands::ingest::execute(args, &cli.global),
        Commands::Inspect(args) => commands::inspect::execute(args, &cli.global),
    };

    if let Err(err) = result {
        let message = match err.downcast_ref::<gpnstore_core::NodeError>() {
            Some(node_err) => commands::describe_error(node_err),
            None => format!("{err:#}"),
        };
        tracing::error!("{message}");
        eprintln!("error: {message}");
        std::process::exit(1);
    }
}
