//! Bulk cell ingestion and export.
//!
//! `insert_cells` is the only way bulk data enters a node: it reconciles
//! the header against the node's hierarchy (creating it on the first call),
//! inserts one cell per data row with the expensive set-level constraints
//! (C1, C3) dropped for throughput, completes the `UNMAPPED` sentinel if
//! absent, re-checks those constraints over the whole table, and records
//! the resulting content hash. `export_cells` is its inverse for a single
//! node's current cells.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::constraints::check_expensive_constraints;
use crate::error::{NodeError, Result};
use crate::ingestion::fingerprint::compute_content_hash;
use crate::kernel::schema_sql::UNMAPPED;
use crate::kernel::Session;
use crate::repository::cell::CellRepository;
use crate::repository::hierarchy::HierarchyRepository;
use crate::repository::property::PropertyRepository;
use crate::repository::ranked_hierarchy;
use crate::schema::column_manager::{drop_unique_indexes, recreate_unique_indexes};

/// Source of rows for `insert_cells`: a header row (hierarchy column
/// names) followed by data rows (one label value per header column, in
/// header order).
pub trait RowIterator {
    fn header(&mut self) -> Result<Vec<String>>;
    fn next_row(&mut self) -> Result<Option<Vec<String>>>;
}

/// Destination for rows from `export_cells`: receives the header once, then
/// one data row per cell, each prefixed with that cell's id.
pub trait RowSink {
    fn write_header(&mut self, header: &[String]) -> Result<()>;
    fn write_row(&mut self, cell_id: i64, values: &[String]) -> Result<()>;
}

/// An in-memory `RowIterator` for callers that already have rows in hand
/// (tests, or hosts that have already parsed their own tabular source).
pub struct VecRowIterator {
    header: Vec<String>,
    rows: std::vec::IntoIter<Vec<String>>,
    header_taken: bool,
}

impl VecRowIterator {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        VecRowIterator {
            header,
            rows: rows.into_iter(),
            header_taken: false,
        }
    }
}

impl RowIterator for VecRowIterator {
    fn header(&mut self) -> Result<Vec<String>> {
        self.header_taken = true;
        Ok(self.header.clone())
    }

    fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        Ok(self.rows.next())
    }
}

/// An in-memory `RowSink` that collects everything written to it.
#[derive(Debug, Default)]
pub struct VecRowSink {
    pub header: Vec<String>,
    pub rows: Vec<(i64, Vec<String>)>,
}

impl RowSink for VecRowSink {
    fn write_header(&mut self, header: &[String]) -> Result<()> {
        self.header = header.to_vec();
        Ok(())
    }

    fn write_row(&mut self, cell_id: i64, values: &[String]) -> Result<()> {
        self.rows.push((cell_id, values.to_vec()));
        Ok(())
    }
}

/// Outcome of a successful `insert_cells` call.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    /// Number of data rows inserted by this call (not counting the
    /// `UNMAPPED` sentinel, whether or not this call is what created it).
    pub rows_inserted: usize,
    /// The node's content hash after this call, or `None` if the node
    /// still has no cells (never the case once any row has been inserted).
    pub content_hash: Option<String>,
}

/// Bulk-insert cells from `rows` into the node behind `session`.
///
/// Runs inside an explicit transaction with a savepoint nested inside it:
/// any failure (header mismatch, duplicate label set, invalid unmapped
/// level) rolls the savepoint back and the outer transaction never
/// commits, leaving the node exactly as it was before the call.
pub fn insert_cells(session: &Session, rows: &mut dyn RowIterator) -> Result<IngestSummary> {
    if session.is_read_only() {
        return Err(NodeError::Readonly);
    }
    let tx = session.transaction()?;
    let savepoint = session.savepoint()?;
    let outcome = insert_cells_locked(&tx, rows);
    match outcome {
        Ok(summary) => {
            savepoint.release()?;
            tx.commit()?;
            Ok(summary)
        }
        Err(err) => {
            savepoint.rollback()?;
            drop(tx);
            Err(err)
        }
    }
}

fn insert_cells_locked(conn: &rusqlite::Connection, rows: &mut dyn RowIterator) -> Result<IngestSummary> {
    let _span = tracing::info_span!("insert_cells").entered();
    debug!("dropping expensive constraints");
    drop_unique_indexes(conn)?;

    let header = rows.header()?;
    reconcile_hierarchy(conn, &header)?;

    let mut rows_inserted = 0usize;
    while let Some(values) = rows.next_row()? {
        if values.len() != header.len() {
            return Err(NodeError::validation(format!(
                "row has {} values, expected {} (matching the header)",
                values.len(),
                header.len()
            )));
        }
        let mapping: BTreeMap<String, String> = header.iter().cloned().zip(values).collect();
        CellRepository::insert_one_cell(conn, &mapping)?;
        rows_inserted += 1;
    }
    debug!(rows_inserted, "data rows inserted");

    if !CellRepository::has_unmapped_sentinel(conn)? {
        let ranked = ranked_hierarchy(conn)?;
        let sentinel: BTreeMap<String, String> = ranked
            .into_iter()
            .map(|(name, _)| (name, UNMAPPED.to_string()))
            .collect();
        CellRepository::insert_one_cell(conn, &sentinel)?;
        debug!("inserted UNMAPPED sentinel cell");
    }

    debug!("recreating expensive constraints");
    if let Err(err) = recreate_unique_indexes(conn) {
        warn!(error = %err, "post-load invariant check failed");
        return Err(err);
    }
    if let Err(err) = check_expensive_constraints(conn) {
        warn!(error = %err, "post-load invariant check failed");
        return Err(err);
    }

    let content_hash = compute_content_hash(conn)?;
    PropertyRepository::set_content_hash(conn, content_hash.as_deref())?;
    info!(rows_inserted, content_hash = content_hash.as_deref().unwrap_or("absent"), "ingestion complete");

    Ok(IngestSummary { rows_inserted, content_hash })
}

/// Create the hierarchy from `header` if the node has none yet; otherwise
/// require the header's column set to equal the existing one (order
/// insensitive).
fn reconcile_hierarchy(conn: &rusqlite::Connection, header: &[String]) -> Result<()> {
    let existing = HierarchyRepository::list(conn)?;
    if existing.is_empty() {
        HierarchyRepository::add(conn, header)?;
        return Ok(());
    }
    let existing_names: HashSet<&str> = existing.iter().map(|l| l.level_name.as_str()).collect();
    let header_names: HashSet<&str> = header.iter().map(|s| s.as_str()).collect();
    if existing_names != header_names {
        return Err(NodeError::validation(
            "ingest header does not match the node's existing hierarchy columns",
        ));
    }
    Ok(())
}

/// Export every ingested cell (excluding the reserved undefined cell and
/// the `UNMAPPED` sentinel, neither of which is itself ingestible data) to
/// `sink`, header first.
pub fn export_cells(session: &Session, sink: &mut dyn RowSink) -> Result<()> {
    let conn = session.connection();
    let ranked = ranked_hierarchy(conn)?;
    let header: Vec<String> = ranked.iter().map(|(name, _)| name.clone()).collect();
    sink.write_header(&header)?;

    let mut stmt = conn.prepare("SELECT index_id FROM node_index WHERE index_id != 0 ORDER BY index_id")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    for index_id in ids {
        let labels = CellRepository::select_cell(conn, index_id)?
            .ok_or_else(|| NodeError::not_found("cell", index_id))?;
        let is_sentinel = labels.iter().all(|(_, value)| value == UNMAPPED);
        if is_sentinel {
            continue;
        }
        let values: Vec<String> = labels.into_iter().map(|(_, value)| value).collect();
        sink.write_row(index_id, &values)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::OpenMode;

    fn rows(header: &[&str], data: Vec<Vec<&str>>) -> VecRowIterator {
        VecRowIterator::new(
            header.iter().map(|s| s.to_string()).collect(),
            data.into_iter().map(|row| row.into_iter().map(|s| s.to_string()).collect()).collect(),
        )
    }

    #[test]
    fn trivial_ingest_creates_hierarchy_and_sentinel() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let mut iter = rows(&["state", "county", "town"], vec![vec!["OH", "Franklin", "Columbus"]]);
        let summary = insert_cells(&session, &mut iter).unwrap();
        assert_eq!(summary.rows_inserted, 1);
        assert!(summary.content_hash.is_some());

        let conn = session.connection();
        assert!(CellRepository::has_unmapped_sentinel(conn).unwrap());
        // reserved cell 0 + inserted cell + sentinel = 3
        assert_eq!(CellRepository::count(conn).unwrap(), 3);
    }

    #[test]
    fn root_singleton_violation_rolls_back_the_whole_call() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let mut first = rows(&["state", "county", "town"], vec![vec!["OH", "Franklin", "Columbus"]]);
        insert_cells(&session, &mut first).unwrap();

        let mut second = rows(&["state", "county", "town"], vec![vec!["IN", "Marion", "Indianapolis"]]);
        let err = insert_cells(&session, &mut second).unwrap_err();
        assert!(matches!(err, NodeError::Validation { .. }));

        let conn = session.connection();
        // still just reserved cell + first cell + sentinel
        assert_eq!(CellRepository::count(conn).unwrap(), 3);
    }

    #[test]
    fn duplicate_label_set_is_rejected() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let mut first = rows(&["state", "county", "town"], vec![vec!["OH", "Franklin", "Columbus"]]);
        insert_cells(&session, &mut first).unwrap();

        let mut second = rows(&["state", "county", "town"], vec![vec!["OH", "Franklin", "Columbus"]]);
        let err = insert_cells(&session, &mut second).unwrap_err();
        assert!(matches!(err, NodeError::Validation { .. }));
    }

    #[test]
    fn unmapped_order_violation_leaves_no_partial_cell() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let mut iter = rows(&["state", "county", "town"], vec![vec!["OH", UNMAPPED, "Cincinnati"]]);
        let err = insert_cells(&session, &mut iter).unwrap_err();
        assert!(matches!(err, NodeError::Validation { .. }));

        let conn = session.connection();
        assert_eq!(CellRepository::count(conn).unwrap(), 1); // only reserved cell 0
    }

    #[test]
    fn header_mismatch_on_second_call_is_rejected() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let mut first = rows(&["state", "county"], vec![vec!["OH", "Franklin"]]);
        insert_cells(&session, &mut first).unwrap();

        let mut second = rows(&["state", "region"], vec![vec!["OH", "Midwest"]]);
        assert!(insert_cells(&session, &mut second).is_err());
    }

    #[test]
    fn export_then_insert_into_fresh_node_reproduces_the_hash() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let mut iter = rows(
            &["state", "county", "town"],
            vec![vec!["OH", "Franklin", "Columbus"], vec!["OH", "Franklin", "Dublin"]],
        );
        let original = insert_cells(&session, &mut iter).unwrap();

        let mut sink = VecRowSink::default();
        export_cells(&session, &mut sink).unwrap();
        assert_eq!(sink.rows.len(), 2); // sentinel and reserved cell excluded

        let fresh = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let data: Vec<Vec<String>> = sink.rows.into_iter().map(|(_, values)| values).collect();
        let mut reimport = VecRowIterator::new(sink.header, data);
        let reimported = insert_cells(&fresh, &mut reimport).unwrap();

        assert_eq!(original.content_hash, reimported.content_hash);
    }
}
