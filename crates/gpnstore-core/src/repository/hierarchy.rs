//! Hierarchy repository.
//!
//! Reads go straight against the `hierarchy` table; mutations (add, rename,
//! delete) delegate to `crate::schema::column_manager`, which is the single
//! place that keeps `node_index`, `location`, and `structure` in lock-step
//! with the hierarchy's column set. This repository exists so callers have
//! one CRUD-shaped entry point per entity, per the repository layer's
//! contract, rather than reaching into the schema manager directly.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::schema::column_manager;

/// One level of a node's hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyLevel {
    pub hierarchy_id: i64,
    pub level_name: String,
    pub level_rank: i64,
}

pub struct HierarchyRepository;

impl HierarchyRepository {
    /// All levels, in rank order (rank 0 = root, first).
    pub fn list(conn: &Connection) -> Result<Vec<HierarchyLevel>> {
        let mut stmt = conn.prepare(
            "SELECT hierarchy_id, level_name, level_rank FROM hierarchy ORDER BY level_rank ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(HierarchyLevel {
                    hierarchy_id: row.get(0)?,
                    level_name: row.get(1)?,
                    level_rank: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get(conn: &Connection, hierarchy_id: i64) -> Result<Option<HierarchyLevel>> {
        conn.query_row(
            "SELECT hierarchy_id, level_name, level_rank FROM hierarchy WHERE hierarchy_id = ?1",
            [hierarchy_id],
            |row| {
                Ok(HierarchyLevel {
                    hierarchy_id: row.get(0)?,
                    level_name: row.get(1)?,
                    level_rank: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn get_by_name(conn: &Connection, level_name: &str) -> Result<Option<HierarchyLevel>> {
        conn.query_row(
            "SELECT hierarchy_id, level_name, level_rank FROM hierarchy WHERE level_name = ?1",
            [level_name],
            |row| {
                Ok(HierarchyLevel {
                    hierarchy_id: row.get(0)?,
                    level_name: row.get(1)?,
                    level_rank: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    /// Add new levels at the next available ranks. Idempotent for names
    /// that already exist (see `column_manager::add_columns`).
    pub fn add(conn: &Connection, names: &[String]) -> Result<()> {
        column_manager::add_columns(conn, names)
    }

    /// Rename levels old -> new.
    pub fn rename(conn: &Connection, mapping: &HashMap<String, String>) -> Result<()> {
        column_manager::update_columns(conn, mapping)
    }

    /// Delete levels by name. Forbidden if it would remove the last level.
    pub fn delete(conn: &Connection, names: &[String]) -> Result<()> {
        column_manager::delete_columns(conn, names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};

    #[test]
    fn add_then_list_in_rank_order() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        HierarchyRepository::add(conn, &["state".to_string(), "county".to_string()]).unwrap();
        let levels = HierarchyRepository::list(conn).unwrap();
        assert_eq!(
            levels.iter().map(|l| l.level_name.as_str()).collect::<Vec<_>>(),
            vec!["state", "county"]
        );
        assert_eq!(levels[0].level_rank, 0);
        assert_eq!(levels[1].level_rank, 1);
    }

    #[test]
    fn get_by_name_roundtrips() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        HierarchyRepository::add(conn, &["state".to_string()]).unwrap();
        let level = HierarchyRepository::get_by_name(conn, "state").unwrap().unwrap();
        assert_eq!(level.level_rank, 0);
        assert!(HierarchyRepository::get_by_name(conn, "missing").unwrap().is_none());
    }
}
