//! Label repository.
//!
//! A label is a value drawn at one hierarchy level, interned per node: the
//! same `(hierarchy_id, label_value)` pair always resolves to the same
//! `label_id`. Ids are auto-assigned by the backing `AUTOINCREMENT` column
//! (C4) unless the caller supplies one explicitly -- the latter is used by
//! round-trip ingestion (`export_cells` followed by `insert_cells`), which
//! must preserve surrogate ids for the content hash to stay stable (P6).

use rusqlite::{Connection, OptionalExtension};

use crate::constraints::validate_label_value;
use crate::error::{NodeError, Result};
use crate::kernel::schema_sql::UNMAPPED;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub label_id: i64,
    pub hierarchy_id: i64,
    pub label_value: String,
}

pub struct LabelRepository;

impl LabelRepository {
    /// Insert a label. `UNMAPPED` bypasses the non-empty check (it's
    /// always valid per the data model). If `id` is given, it is used as
    /// the surrogate key explicitly rather than left to autoincrement.
    pub fn add(
        conn: &Connection,
        hierarchy_id: i64,
        label_value: &str,
        id: Option<i64>,
    ) -> Result<i64> {
        if label_value != UNMAPPED {
            validate_label_value(label_value)?;
        }
        match id {
            Some(id) => {
                conn.execute(
                    "INSERT INTO label (label_id, hierarchy_id, label_value) VALUES (?1, ?2, ?3)",
                    rusqlite::params![id, hierarchy_id, label_value],
                )?;
                Ok(id)
            }
            None => {
                conn.execute(
                    "INSERT INTO label (hierarchy_id, label_value) VALUES (?1, ?2)",
                    rusqlite::params![hierarchy_id, label_value],
                )?;
                Ok(conn.last_insert_rowid())
            }
        }
    }

    /// Insert if absent, returning the existing or newly-assigned id.
    pub fn get_or_create(conn: &Connection, hierarchy_id: i64, label_value: &str) -> Result<i64> {
        if let Some(existing) = Self::find(conn, hierarchy_id, label_value)? {
            return Ok(existing.label_id);
        }
        Self::add(conn, hierarchy_id, label_value, None)
    }

    pub fn get(conn: &Connection, label_id: i64) -> Result<Option<Label>> {
        conn.query_row(
            "SELECT label_id, hierarchy_id, label_value FROM label WHERE label_id = ?1",
            [label_id],
            |row| {
                Ok(Label {
                    label_id: row.get(0)?,
                    hierarchy_id: row.get(1)?,
                    label_value: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn find(conn: &Connection, hierarchy_id: i64, label_value: &str) -> Result<Option<Label>> {
        conn.query_row(
            "SELECT label_id, hierarchy_id, label_value FROM label \
             WHERE hierarchy_id = ?1 AND label_value = ?2",
            rusqlite::params![hierarchy_id, label_value],
            |row| {
                Ok(Label {
                    label_id: row.get(0)?,
                    hierarchy_id: row.get(1)?,
                    label_value: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    /// Replace a label's value in place, preserving its id and hierarchy.
    pub fn update(conn: &Connection, label_id: i64, new_value: &str) -> Result<()> {
        if new_value != UNMAPPED {
            validate_label_value(new_value)?;
        }
        if Self::get(conn, label_id)?.is_none() {
            return Err(NodeError::not_found("label", label_id));
        }
        conn.execute(
            "UPDATE label SET label_value = ?1 WHERE label_id = ?2",
            rusqlite::params![new_value, label_id],
        )?;
        Ok(())
    }

    /// Delete a label. Blocked by a foreign-key violation if any cell,
    /// location, or structure row still references it.
    pub fn delete(conn: &Connection, label_id: i64) -> Result<()> {
        let changed = conn.execute("DELETE FROM label WHERE label_id = ?1", [label_id])?;
        if changed == 0 {
            return Err(NodeError::not_found("label", label_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};
    use crate::schema::column_manager::add_columns;

    #[test]
    fn get_or_create_interns() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        add_columns(conn, &["state".to_string()]).unwrap();
        let hierarchy_id = crate::repository::hierarchy::HierarchyRepository::get_by_name(conn, "state")
            .unwrap()
            .unwrap()
            .hierarchy_id;
        let a = LabelRepository::get_or_create(conn, hierarchy_id, "OH").unwrap();
        let b = LabelRepository::get_or_create(conn, hierarchy_id, "OH").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_value() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        add_columns(conn, &["state".to_string()]).unwrap();
        let hierarchy_id = crate::repository::hierarchy::HierarchyRepository::get_by_name(conn, "state")
            .unwrap()
            .unwrap()
            .hierarchy_id;
        assert!(LabelRepository::add(conn, hierarchy_id, "", None).is_err());
    }

    #[test]
    fn explicit_id_round_trips() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        add_columns(conn, &["state".to_string()]).unwrap();
        let hierarchy_id = crate::repository::hierarchy::HierarchyRepository::get_by_name(conn, "state")
            .unwrap()
            .unwrap()
            .hierarchy_id;
        let id = LabelRepository::add(conn, hierarchy_id, "OH", Some(42)).unwrap();
        assert_eq!(id, 42);
        assert_eq!(LabelRepository::get(conn, 42).unwrap().unwrap().label_value, "OH");
    }
}
