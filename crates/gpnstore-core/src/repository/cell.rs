//! Cell (`node_index`) repository.
//!
//! Cells are rows of `node_index`: one surrogate `index_id`, a `partial`
//! flag, and exactly one label-id column per hierarchy level. Labels are
//! stored directly as the cell's own columns (not a separate link table)
//! since the schema manager keeps one column per level; "linking a cell to
//! a label" (per the design's repository description) is simply writing
//! that column's value.

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension};

use crate::constraints::check_not_reserved_cell;
use crate::error::{NodeError, Result};
use crate::identifier::quote_identifier;
use crate::repository::label::LabelRepository;
use crate::repository::ranked_hierarchy;

pub struct CellRepository;

impl CellRepository {
    /// Insert one cell from a `hierarchy name -> label value` mapping.
    /// The mapping must name exactly the node's current hierarchy levels;
    /// missing or unrecognised names are a validation error. Labels absent
    /// from the `label` table are interned (auto-assigned ids, C4).
    ///
    /// Returns the new cell's `index_id`.
    pub fn insert_one_cell(conn: &Connection, mapping: &BTreeMap<String, String>) -> Result<i64> {
        let ranked = ranked_hierarchy(conn)?;
        if ranked.is_empty() {
            return Err(NodeError::validation(
                "cannot insert a cell before the node has a hierarchy",
            ));
        }
        if ranked.len() != mapping.len() {
            return Err(NodeError::validation(format!(
                "expected {} hierarchy columns, got {}",
                ranked.len(),
                mapping.len()
            )));
        }

        let mut columns = Vec::with_capacity(ranked.len());
        let mut label_ids = Vec::with_capacity(ranked.len());
        for (name, hierarchy_id) in &ranked {
            let value = mapping
                .get(name)
                .ok_or_else(|| NodeError::validation(format!("missing hierarchy column {name:?}")))?;
            let label_id = LabelRepository::get_or_create(conn, *hierarchy_id, value)?;
            columns.push(quote_identifier(name));
            label_ids.push(label_id);
        }

        let placeholders: Vec<String> = (1..=label_ids.len()).map(|i| format!("?{i}")).collect();
        conn.execute(
            &format!(
                "INSERT INTO node_index ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            ),
            rusqlite::params_from_iter(label_ids.iter()),
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_partial(conn: &Connection, index_id: i64) -> Result<Option<bool>> {
        conn.query_row(
            "SELECT partial FROM node_index WHERE index_id = ?1",
            [index_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|opt| opt.map(|v| v != 0))
        .map_err(Into::into)
    }

    pub fn update_partial(conn: &Connection, index_id: i64, partial: bool) -> Result<()> {
        check_not_reserved_cell(index_id)?;
        let changed = conn.execute(
            "UPDATE node_index SET partial = ?1 WHERE index_id = ?2",
            rusqlite::params![partial as i64, index_id],
        )?;
        if changed == 0 {
            return Err(NodeError::not_found("cell", index_id));
        }
        Ok(())
    }

    pub fn delete(conn: &Connection, index_id: i64) -> Result<()> {
        check_not_reserved_cell(index_id)?;
        let changed = conn.execute("DELETE FROM node_index WHERE index_id = ?1", [index_id])?;
        if changed == 0 {
            return Err(NodeError::not_found("cell", index_id));
        }
        Ok(())
    }

    /// Intersect the cell sets matching each `hierarchy_name = value`
    /// criterion, as a single query rather than per-criterion scans
    /// intersected in application code. An empty criteria set is a caller
    /// error. A criterion naming a value with no matching label returns an
    /// empty result (there is nothing for it to match), not an error.
    pub fn select_cell_ids(conn: &Connection, criteria: &[(&str, &str)]) -> Result<Vec<i64>> {
        if criteria.is_empty() {
            return Err(NodeError::validation(
                "select_cell_ids requires at least one criterion",
            ));
        }
        let mut conditions = Vec::with_capacity(criteria.len());
        let mut label_ids = Vec::with_capacity(criteria.len());
        for (name, value) in criteria {
            let hierarchy_id = crate::repository::hierarchy::HierarchyRepository::get_by_name(conn, name)?
                .ok_or_else(|| NodeError::not_found("hierarchy level", name))?
                .hierarchy_id;
            let label = LabelRepository::find(conn, hierarchy_id, value)?;
            let label_id = match label {
                Some(l) => l.label_id,
                None => return Ok(Vec::new()),
            };
            conditions.push(format!("{} = ?{}", quote_identifier(name), label_ids.len() + 1));
            label_ids.push(label_id);
        }
        let query = format!(
            "SELECT index_id FROM node_index WHERE {}",
            conditions.join(" AND ")
        );
        let mut stmt = conn.prepare(&query)?;
        let ids = stmt
            .query_map(rusqlite::params_from_iter(label_ids.iter()), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// The cell's label mapping, ordered by hierarchy rank. `None` if the
    /// cell doesn't exist.
    pub fn select_cell(conn: &Connection, index_id: i64) -> Result<Option<Vec<(String, String)>>> {
        let ranked = ranked_hierarchy(conn)?;
        if CellRepository::get_partial(conn, index_id)?.is_none() {
            return Ok(None);
        }
        if ranked.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let select_list = ranked
            .iter()
            .enumerate()
            .map(|(i, _)| format!("l{i}.label_value AS v{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let joins = ranked
            .iter()
            .enumerate()
            .map(|(i, (name, _))| {
                format!(
                    "JOIN label l{i} ON l{i}.label_id = ni.{}",
                    quote_identifier(name)
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let query = format!(
            "SELECT {select_list} FROM node_index ni {joins} WHERE ni.index_id = ?1"
        );
        let row = conn.query_row(&query, [index_id], |row| {
            let mut out = Vec::with_capacity(ranked.len());
            for (i, (name, _)) in ranked.iter().enumerate() {
                let value: String = row.get(i)?;
                out.push((name.clone(), value));
            }
            Ok(out)
        })?;
        Ok(Some(row))
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM node_index", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Does the node already contain the sentinel cell whose labels are
    /// `UNMAPPED` at every level?
    pub fn has_unmapped_sentinel(conn: &Connection) -> Result<bool> {
        let ranked = ranked_hierarchy(conn)?;
        if ranked.is_empty() {
            return Ok(false);
        }
        let mut criteria = Vec::with_capacity(ranked.len());
        for (name, _) in &ranked {
            criteria.push((name.as_str(), crate::kernel::schema_sql::UNMAPPED));
        }
        Ok(!Self::select_cell_ids(conn, &criteria)?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};
    use crate::kernel::schema_sql::UNMAPPED;
    use crate::schema::column_manager::add_columns;

    fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn insert_and_select_cell_round_trips() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        add_columns(conn, &["state".to_string(), "county".to_string()]).unwrap();
        let id = CellRepository::insert_one_cell(
            conn,
            &mapping(&[("state", "OH"), ("county", "Franklin")]),
        )
        .unwrap();
        let labels = CellRepository::select_cell(conn, id).unwrap().unwrap();
        assert_eq!(
            labels,
            vec![
                ("state".to_string(), "OH".to_string()),
                ("county".to_string(), "Franklin".to_string())
            ]
        );
    }

    #[test]
    fn select_cell_ids_intersects_criteria() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        add_columns(conn, &["state".to_string(), "county".to_string()]).unwrap();
        let id1 = CellRepository::insert_one_cell(
            conn,
            &mapping(&[("state", "OH"), ("county", "Franklin")]),
        )
        .unwrap();
        CellRepository::insert_one_cell(
            conn,
            &mapping(&[("state", "OH"), ("county", "Cuyahoga")]),
        )
        .unwrap();
        let ids = CellRepository::select_cell_ids(conn, &[("state", "OH"), ("county", "Franklin")]).unwrap();
        assert_eq!(ids, vec![id1]);
    }

    #[test]
    fn select_cell_ids_rejects_empty_criteria() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        assert!(CellRepository::select_cell_ids(conn, &[]).is_err());
    }

    #[test]
    fn reserved_cell_cannot_be_updated_or_deleted() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        assert!(CellRepository::update_partial(conn, 0, true).is_err());
        assert!(CellRepository::delete(conn, 0).is_err());
    }

    #[test]
    fn has_unmapped_sentinel_detects_presence() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        add_columns(conn, &["state".to_string(), "county".to_string()]).unwrap();
        assert!(!CellRepository::has_unmapped_sentinel(conn).unwrap());
        CellRepository::insert_one_cell(conn, &mapping(&[("state", UNMAPPED), ("county", UNMAPPED)])).unwrap();
        assert!(CellRepository::has_unmapped_sentinel(conn).unwrap());
    }
}
