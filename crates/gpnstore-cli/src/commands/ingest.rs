//! `ingest` command - bulk-load cells from a delimited file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use csv::ReaderBuilder;
use gpnstore_core::config::NodeConfig;
use gpnstore_core::ingestion::RowIterator;
use gpnstore_core::Node;
use tracing::info;

use crate::progress::{finish_spinner, finish_spinner_warn, spinner};
use crate::GlobalOptions;

/// Arguments for the `ingest` command.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Path to the node file to ingest into
    node: PathBuf,

    /// Delimited file to read rows from (first row is the header)
    csv_file: PathBuf,
}

/// A [`RowIterator`] over a CSV file on disk.
struct CsvRowIterator {
    reader: csv::Reader<std::fs::File>,
    header: Vec<String>,
}

impl CsvRowIterator {
    fn open(path: &std::path::Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let header = reader
            .headers()
            .with_context(|| format!("failed to read header row of {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect();
        Ok(CsvRowIterator { reader, header })
    }
}

impl RowIterator for CsvRowIterator {
    fn header(&mut self) -> gpnstore_core::Result<Vec<String>> {
        Ok(self.header.clone())
    }

    fn next_row(&mut self) -> gpnstore_core::Result<Option<Vec<String>>> {
        let mut record = csv::StringRecord::new();
        let has_more = self
            .reader
            .read_record(&mut record)
            .map_err(|e| gpnstore_core::NodeError::validation(format!("malformed CSV row: {e}")))?;
        if !has_more {
            return Ok(None);
        }
        Ok(Some(record.iter().map(str::to_string).collect()))
    }
}

pub fn execute(args: IngestArgs, global: &GlobalOptions) -> Result<()> {
    let node = Node::open(&args.node, &NodeConfig::default())
        .with_context(|| format!("failed to open node {}", args.node.display()))?;
    let mut rows = CsvRowIterator::open(&args.csv_file)?;

    let pb = spinner(&format!("Ingesting {}", args.csv_file.display()), global.quiet);
    let summary = match node.insert_cells(&mut rows) {
        Ok(summary) => summary,
        Err(err) => {
            finish_spinner_warn(pb, "Ingest failed");
            return Err(err.into());
        }
    };
    finish_spinner(pb, "Ingest complete");
    info!(rows_inserted = summary.rows_inserted, "ingest: completed");

    if !global.quiet {
        println!("Inserted {} row(s).", summary.rows_inserted);
        println!("Node now holds {} cell(s).", node.cell_count()?);
        match &summary.content_hash {
            Some(hash) => println!("Content hash: {hash}"),
            None => println!("Content hash: absent"),
        }
    }
    Ok(())
}
