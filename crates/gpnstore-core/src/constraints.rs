//! Constraint Engine: invariants that are cheaper to check as a single
//! set-level query than to express as a per-row trigger, plus the JSON
//! shape predicates applied to the typed TEXT columns.
//!
//! C1 (unique label-set) and C7/C8 (default-edge uniqueness, relation
//! bounds) are enforced natively by the DDL in `kernel::schema_sql` and the
//! composite indexes in `schema::column_manager`; what's left here is what
//! those mechanisms can't express: C2's root-singleton rule, C3's
//! unmapped-downward-closure rule, C5's JSON shape checks, and C9's
//! reserved-cell guard.

use rusqlite::Connection;
use serde_json::Value;

use crate::error::{NodeError, Result};
use crate::identifier::quote_identifier;
use crate::kernel::schema_sql::UNMAPPED;

/// Reserved cell id that denotes the undefined point (C9).
pub const RESERVED_CELL_ID: i64 = 0;

/// C9: the reserved cell is immutable and undeletable.
pub fn check_not_reserved_cell(cell_id: i64) -> Result<()> {
    if cell_id == RESERVED_CELL_ID {
        return Err(NodeError::schema_state(
            "the reserved undefined cell (id 0) cannot be updated or deleted",
        ));
    }
    Ok(())
}

/// Ordered (column_name, hierarchy_id) pairs for the label-bearing columns,
/// in rank order (rank 0 = root, first).
fn ranked_columns(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT level_name, hierarchy_id FROM hierarchy ORDER BY level_rank ASC",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// C2: across all cells, the root (rank-0) level has at most one
/// non-`UNMAPPED` label value.
///
/// A node with no hierarchy yet trivially satisfies this.
pub fn check_root_singleton(conn: &Connection) -> Result<()> {
    let ranked = ranked_columns(conn)?;
    let root = match ranked.first() {
        Some((name, _)) => name,
        None => return Ok(()),
    };
    let quoted_root = quote_identifier(root);
    // The reserved cell 0 is backfilled with the placeholder label (not
    // UNMAPPED) when a column is added after it exists; it is not real data
    // and must not count toward the root-singleton tally.
    let distinct_non_unmapped: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(DISTINCT ni.{quoted_root}) FROM node_index ni \
             JOIN label la ON la.label_id = ni.{quoted_root} \
             WHERE la.label_value != ?1 AND ni.index_id != ?2"
        ),
        rusqlite::params![UNMAPPED, RESERVED_CELL_ID],
        |row| row.get(0),
    )?;
    if distinct_non_unmapped > 1 {
        return Err(NodeError::validation(
            "root hierarchy cannot have multiple values",
        ));
    }
    Ok(())
}

/// C3: for every cell, the set of levels at which it is `UNMAPPED` is a
/// contiguous tail of the rank order -- once a cell is `UNMAPPED` at some
/// level, it must be `UNMAPPED` at every finer (higher-rank) level too.
pub fn check_unmapped_downward_closure(conn: &Connection) -> Result<()> {
    let ranked = ranked_columns(conn)?;
    if ranked.is_empty() {
        return Ok(());
    }

    let select_list = (0..ranked.len())
        .map(|i| format!("la{i}.label_value AS v{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let joins = ranked
        .iter()
        .enumerate()
        .map(|(i, (name, _))| {
            let quoted = quote_identifier(name);
            format!("JOIN label la{i} ON la{i}.label_id = ni.{quoted}")
        })
        .collect::<Vec<_>>()
        .join(" ");
    let query = format!("SELECT ni.index_id, {select_list} FROM node_index ni {joins}");

    let mut stmt = conn.prepare(&query)?;
    let n = ranked.len();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let index_id: i64 = row.get(0)?;
        let mut seen_unmapped = false;
        for i in 0..n {
            let value: String = row.get(i + 1)?;
            let is_unmapped = value == UNMAPPED;
            if seen_unmapped && !is_unmapped {
                return Err(NodeError::validation(format!(
                    "invalid unmapped level (cell {index_id})"
                )));
            }
            seen_unmapped |= is_unmapped;
        }
    }
    Ok(())
}

/// Run both of the expensive, set-level checks (C1 is verified separately
/// by `schema::column_manager::recreate_unique_indexes`). Ingestion calls
/// this once after expensive constraints are recreated.
pub fn check_expensive_constraints(conn: &Connection) -> Result<()> {
    check_root_singleton(conn)?;
    check_unmapped_downward_closure(conn)?;
    Ok(())
}

/// C5: validate that `value` is wellformed JSON of no particular shape.
pub fn validate_json_wellformed(value: &str) -> Result<()> {
    serde_json::from_str::<Value>(value)?;
    Ok(())
}

/// C5: validate that `value` parses as a JSON array of strings (used for
/// edge/weighting `selectors`).
pub fn validate_json_array_of_strings(value: &str) -> Result<()> {
    let parsed: Value = serde_json::from_str(value)?;
    match parsed {
        Value::Array(items) if items.iter().all(|v| v.is_string()) => Ok(()),
        _ => Err(NodeError::validation(
            "expected a JSON array of strings",
        )),
    }
}

/// C5: validate that `value` parses as a JSON object whose values are all
/// strings (used for `attribute.attribute_value`).
pub fn validate_json_object_of_strings(value: &str) -> Result<()> {
    let parsed: Value = serde_json::from_str(value)?;
    match parsed {
        Value::Object(map) if map.values().all(|v| v.is_string()) => Ok(()),
        _ => Err(NodeError::validation(
            "expected a JSON object of string values",
        )),
    }
}

/// C5: validate that `value` parses as a JSON object with arbitrary JSON
/// values (used for `edge.user_properties`).
pub fn validate_json_object_of_any(value: &str) -> Result<()> {
    let parsed: Value = serde_json::from_str(value)?;
    match parsed {
        Value::Object(_) => Ok(()),
        _ => Err(NodeError::validation("expected a JSON object")),
    }
}

/// C6: a label value must be non-empty. `UNMAPPED` always passes.
pub fn validate_label_value(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(NodeError::validation("label value must not be empty"));
    }
    Ok(())
}

/// Canonicalise a JSON object by sorting its keys, so equality-by-content
/// is a plain string comparison. Used before interning attributes.
pub fn canonicalize_json_object(value: &str) -> Result<String> {
    let parsed: Value = serde_json::from_str(value)?;
    let map = match parsed {
        Value::Object(map) => map,
        _ => return Err(NodeError::validation("expected a JSON object")),
    };
    let sorted: std::collections::BTreeMap<String, Value> = map.into_iter().collect();
    Ok(serde_json::to_string(&sorted)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};
    use crate::schema::column_manager::add_columns;

    fn fresh_session() -> Session {
        Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap()
    }

    fn insert_cell(conn: &Connection, columns: &[&str], values: &[&str]) -> i64 {
        let mut label_ids = Vec::new();
        for (col, value) in columns.iter().zip(values) {
            let hierarchy_id: i64 = conn
                .query_row(
                    "SELECT hierarchy_id FROM hierarchy WHERE level_name = ?1",
                    [col],
                    |row| row.get(0),
                )
                .unwrap();
            conn.execute(
                "INSERT OR IGNORE INTO label (hierarchy_id, label_value) VALUES (?1, ?2)",
                rusqlite::params![hierarchy_id, value],
            )
            .unwrap();
            let label_id: i64 = conn
                .query_row(
                    "SELECT label_id FROM label WHERE hierarchy_id = ?1 AND label_value = ?2",
                    rusqlite::params![hierarchy_id, value],
                    |row| row.get(0),
                )
                .unwrap();
            label_ids.push(label_id);
        }
        let quoted_cols: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        let placeholders: Vec<String> = (1..=label_ids.len()).map(|i| format!("?{i}")).collect();
        conn.execute(
            &format!(
                "INSERT INTO node_index ({}) VALUES ({})",
                quoted_cols.join(", "),
                placeholders.join(", ")
            ),
            rusqlite::params_from_iter(label_ids.iter()),
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn root_singleton_accepts_single_root_value() {
        let session = fresh_session();
        let conn = session.connection();
        add_columns(conn, &["state".to_string(), "county".to_string()]).unwrap();
        insert_cell(conn, &["state", "county"], &["OH", "Franklin"]);
        assert!(check_root_singleton(conn).is_ok());
    }

    #[test]
    fn root_singleton_rejects_second_root_value() {
        let session = fresh_session();
        let conn = session.connection();
        add_columns(conn, &["state".to_string(), "county".to_string()]).unwrap();
        insert_cell(conn, &["state", "county"], &["OH", "Franklin"]);
        insert_cell(conn, &["state", "county"], &["IN", "Marion"]);
        let err = check_root_singleton(conn).unwrap_err();
        assert!(matches!(err, NodeError::Validation { .. }));
    }

    #[test]
    fn unmapped_downward_closure_rejects_gap() {
        let session = fresh_session();
        let conn = session.connection();
        add_columns(
            conn,
            &["state".to_string(), "county".to_string(), "town".to_string()],
        )
        .unwrap();
        insert_cell(conn, &["state", "county", "town"], &["OH", UNMAPPED, "Cincinnati"]);
        let err = check_unmapped_downward_closure(conn).unwrap_err();
        assert!(matches!(err, NodeError::Validation { .. }));
    }

    #[test]
    fn unmapped_downward_closure_accepts_contiguous_tail() {
        let session = fresh_session();
        let conn = session.connection();
        add_columns(
            conn,
            &["state".to_string(), "county".to_string(), "town".to_string()],
        )
        .unwrap();
        insert_cell(conn, &["state", "county", "town"], &["OH", UNMAPPED, UNMAPPED]);
        assert!(check_unmapped_downward_closure(conn).is_ok());
    }

    #[test]
    fn json_array_of_strings_rejects_non_string_items() {
        assert!(validate_json_array_of_strings(r#"["a", 1]"#).is_err());
        assert!(validate_json_array_of_strings(r#"["a", "b"]"#).is_ok());
    }

    #[test]
    fn json_object_of_strings_rejects_nested_values() {
        assert!(validate_json_object_of_strings(r#"{"k": {"nested": true}}"#).is_err());
        assert!(validate_json_object_of_strings(r#"{"k": "v"}"#).is_ok());
    }

    #[test]
    fn canonicalize_sorts_keys() {
        let canon = canonicalize_json_object(r#"{"b": "2", "a": "1"}"#).unwrap();
        assert_eq!(canon, r#"{"a":"1","b":"2"}"#);
    }

    #[test]
    fn reserved_cell_guard_rejects_zero() {
        assert!(check_not_reserved_cell(0).is_err());
        assert!(check_not_reserved_cell(1).is_ok());
    }
}
