//! Grouped matching: a supplemental helper for edge-building ingestion
//! paths layered over `select_cell_ids`. Rows sharing the same label tuple
//! are grouped so one lookup resolves all of them, instead of one lookup
//! per row.
//!
//! Mirrors the reference matcher's exact/ambiguous/unresolvable/over-limit
//! classification: a unique match is resolved directly; zero matches are
//! counted as unresolvable; matches up to the caller's ambiguity limit are
//! recorded for disambiguation; matches beyond it are counted separately so
//! the two failure modes stay distinguishable in a summary.

use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::error::Result;
use crate::repository::cell::CellRepository;

/// The outcome of resolving one group of mapping rows sharing a label
/// tuple against this node's cells.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupOutcome {
    /// Exactly one cell matched; resolved to it.
    Unique { run_ids: Vec<i64>, index_id: i64 },
    /// No cell matched this tuple.
    Unresolvable { run_ids: Vec<i64> },
    /// More than one cell matched, but within the caller's ambiguity limit.
    Ambiguous {
        run_ids: Vec<i64>,
        matched_category: Vec<String>,
        candidates: Vec<i64>,
    },
    /// More than one cell matched, beyond the caller's ambiguity limit.
    OverLimit { run_ids: Vec<i64>, num_matches: usize },
}

/// Group `rows` (each a `(run_id, hierarchy_name -> value)` pair) by equal
/// label tuple, and resolve each group with a single `select_cell_ids`
/// lookup. Columns with an empty value are dropped from the lookup
/// criteria (an all-empty tuple matches nothing and is reported
/// unresolvable without querying).
pub fn match_grouped(
    conn: &Connection,
    mut rows: Vec<(i64, BTreeMap<String, String>)>,
    match_limit: usize,
) -> Result<Vec<GroupOutcome>> {
    rows.sort_by(|(_, a), (_, b)| a.cmp(b));

    let mut outcomes = Vec::new();
    let mut iter = rows.into_iter().peekable();
    while let Some((first_run_id, key)) = iter.next() {
        let mut run_ids = vec![first_run_id];
        while let Some((_, next_key)) = iter.peek() {
            if *next_key == key {
                let (run_id, _) = iter.next().expect("peeked Some");
                run_ids.push(run_id);
            } else {
                break;
            }
        }

        let criteria: Vec<(&str, &str)> = key
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let matches = if criteria.is_empty() {
            Vec::new()
        } else {
            CellRepository::select_cell_ids(conn, &criteria)?
        };

        let outcome = match matches.len() {
            0 => GroupOutcome::Unresolvable { run_ids },
            1 => GroupOutcome::Unique { run_ids, index_id: matches[0] },
            n if n <= match_limit => GroupOutcome::Ambiguous {
                run_ids,
                matched_category: key.keys().cloned().collect(),
                candidates: matches,
            },
            n => GroupOutcome::OverLimit { run_ids, num_matches: n },
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};
    use crate::repository::cell::CellRepository;
    use crate::schema::column_manager::add_columns;

    fn tuple(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn duplicate_tuples_share_one_lookup_and_resolve_together() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        add_columns(conn, &["state".to_string(), "county".to_string()]).unwrap();
        let id = CellRepository::insert_one_cell(conn, &tuple(&[("state", "OH"), ("county", "Franklin")])).unwrap();

        let rows = vec![
            (1, tuple(&[("state", "OH"), ("county", "Franklin")])),
            (2, tuple(&[("state", "OH"), ("county", "Franklin")])),
        ];
        let outcomes = match_grouped(conn, rows, 1).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0],
            GroupOutcome::Unique { run_ids: vec![1, 2], index_id: id }
        );
    }

    #[test]
    fn zero_matches_is_unresolvable() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        add_columns(conn, &["state".to_string(), "county".to_string()]).unwrap();

        let rows = vec![(1, tuple(&[("state", "OH"), ("county", "Franklin")]))];
        let outcomes = match_grouped(conn, rows, 1).unwrap();
        assert_eq!(outcomes[0], GroupOutcome::Unresolvable { run_ids: vec![1] });
    }

    #[test]
    fn over_limit_is_distinguished_from_ambiguous() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        add_columns(conn, &["state".to_string(), "county".to_string()]).unwrap();
        CellRepository::insert_one_cell(conn, &tuple(&[("state", "OH"), ("county", "Franklin")])).unwrap();
        CellRepository::insert_one_cell(conn, &tuple(&[("state", "OH"), ("county", "Cuyahoga")])).unwrap();
        CellRepository::insert_one_cell(conn, &tuple(&[("state", "OH"), ("county", "Summit")])).unwrap();

        // An empty `county` value drops it from the lookup criteria, so the
        // tuple is really just `state = OH`, which matches all three cells.
        let rows = vec![(1, tuple(&[("state", "OH"), ("county", "")]))];
        let ambiguous = match_grouped(conn, rows.clone(), 5).unwrap();
        assert!(matches!(ambiguous[0], GroupOutcome::Ambiguous { .. }));

        let over_limit = match_grouped(conn, rows, 2).unwrap();
        assert_eq!(over_limit[0], GroupOutcome::OverLimit { run_ids: vec![1], num_matches: 3 });
    }
}
