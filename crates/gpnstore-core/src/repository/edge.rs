//! Edge repository.
//!
//! An edge is a directed reference from this node to another, named
//! uniquely together with the other node's id. `is_default` is either `1`
//! or `NULL` (never `0`) so a `UNIQUE (is_default, other_unique_id)` index
//! alone enforces C7 -- at most one default edge per referenced node --
//! without a trigger: SQLite treats `NULL` as distinct from every other
//! `NULL` in a unique index, so any number of non-default edges coexist.

use rusqlite::{Connection, OptionalExtension};

use crate::constraints::{validate_json_array_of_strings, validate_json_object_of_any};
use crate::error::{NodeError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub edge_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub selectors: Option<String>,
    pub user_properties: Option<String>,
    pub other_unique_id: String,
    pub other_filename_hint: Option<String>,
    pub other_index_hash: Option<String>,
    pub is_locally_complete: bool,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewEdge<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub selectors: Option<&'a str>,
    pub user_properties: Option<&'a str>,
    pub other_unique_id: &'a str,
    pub other_filename_hint: Option<&'a str>,
    pub other_index_hash: Option<&'a str>,
}

pub struct EdgeRepository;

impl EdgeRepository {
    pub fn add(conn: &Connection, edge: NewEdge<'_>) -> Result<i64> {
        if let Some(selectors) = edge.selectors {
            validate_json_array_of_strings(selectors)?;
        }
        if let Some(user_properties) = edge.user_properties {
            validate_json_object_of_any(user_properties)?;
        }
        conn.execute(
            "INSERT INTO edge (name, description, selectors, user_properties, other_unique_id, \
             other_filename_hint, other_index_hash, is_locally_complete, is_default) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL)",
            rusqlite::params![
                edge.name,
                edge.description,
                edge.selectors,
                edge.user_properties,
                edge.other_unique_id,
                edge.other_filename_hint,
                edge.other_index_hash,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                NodeError::conflict(format!(
                    "edge name {:?} already used for other node {:?}",
                    edge.name, edge.other_unique_id
                ))
            }
            other => NodeError::from(other),
        })?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, edge_id: i64) -> Result<Option<Edge>> {
        conn.query_row(
            "SELECT edge_id, name, description, selectors, user_properties, other_unique_id, \
             other_filename_hint, other_index_hash, is_locally_complete, is_default \
             FROM edge WHERE edge_id = ?1",
            [edge_id],
            Self::from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn delete(conn: &Connection, edge_id: i64) -> Result<()> {
        let changed = conn.execute("DELETE FROM edge WHERE edge_id = ?1", [edge_id])?;
        if changed == 0 {
            return Err(NodeError::not_found("edge", edge_id));
        }
        Ok(())
    }

    pub fn set_locally_complete(conn: &Connection, edge_id: i64, complete: bool) -> Result<()> {
        let changed = conn.execute(
            "UPDATE edge SET is_locally_complete = ?1 WHERE edge_id = ?2",
            rusqlite::params![complete as i64, edge_id],
        )?;
        if changed == 0 {
            return Err(NodeError::not_found("edge", edge_id));
        }
        Ok(())
    }

    /// Mark `edge_id` the default for its `other_unique_id`, clearing any
    /// previous default for that same other-node first so C7 (at most one
    /// default per other-node) holds without relying on the unique index
    /// to reject the write -- this is the explicit state transition the
    /// design calls for rather than a bare insert-and-hope.
    pub fn set_default(conn: &Connection, edge_id: i64) -> Result<()> {
        let other_unique_id: Option<String> = conn
            .query_row(
                "SELECT other_unique_id FROM edge WHERE edge_id = ?1",
                [edge_id],
                |row| row.get(0),
            )
            .optional()?;
        let other_unique_id = other_unique_id.ok_or_else(|| NodeError::not_found("edge", edge_id))?;
        conn.execute(
            "UPDATE edge SET is_default = NULL WHERE other_unique_id = ?1 AND edge_id != ?2",
            rusqlite::params![other_unique_id, edge_id],
        )?;
        conn.execute(
            "UPDATE edge SET is_default = 1 WHERE edge_id = ?1",
            [edge_id],
        )?;
        Ok(())
    }

    pub fn clear_default(conn: &Connection, edge_id: i64) -> Result<()> {
        let changed = conn.execute(
            "UPDATE edge SET is_default = NULL WHERE edge_id = ?1",
            [edge_id],
        )?;
        if changed == 0 {
            return Err(NodeError::not_found("edge", edge_id));
        }
        Ok(())
    }

    pub fn get_default_for(conn: &Connection, other_unique_id: &str) -> Result<Option<Edge>> {
        conn.query_row(
            "SELECT edge_id, name, description, selectors, user_properties, other_unique_id, \
             other_filename_hint, other_index_hash, is_locally_complete, is_default \
             FROM edge WHERE other_unique_id = ?1 AND is_default = 1",
            [other_unique_id],
            Self::from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Edge> {
        Ok(Edge {
            edge_id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            selectors: row.get(3)?,
            user_properties: row.get(4)?,
            other_unique_id: row.get(5)?,
            other_filename_hint: row.get(6)?,
            other_index_hash: row.get(7)?,
            is_locally_complete: row.get::<_, i64>(8)? != 0,
            is_default: row.get::<_, Option<i64>>(9)?.unwrap_or(0) != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};

    fn new_edge<'a>(name: &'a str, other: &'a str) -> NewEdge<'a> {
        NewEdge {
            name,
            other_unique_id: other,
            ..Default::default()
        }
    }

    #[test]
    fn only_one_default_per_other_node() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        let e1 = EdgeRepository::add(conn, new_edge("to-a", "other-1")).unwrap();
        let e2 = EdgeRepository::add(conn, new_edge("to-a-alt", "other-1")).unwrap();
        EdgeRepository::set_default(conn, e1).unwrap();
        assert!(EdgeRepository::get(conn, e1).unwrap().unwrap().is_default);
        EdgeRepository::set_default(conn, e2).unwrap();
        assert!(!EdgeRepository::get(conn, e1).unwrap().unwrap().is_default);
        assert!(EdgeRepository::get(conn, e2).unwrap().unwrap().is_default);
    }

    #[test]
    fn duplicate_name_and_other_id_is_a_conflict() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        EdgeRepository::add(conn, new_edge("to-a", "other-1")).unwrap();
        let err = EdgeRepository::add(conn, new_edge("to-a", "other-1")).unwrap_err();
        assert!(matches!(err, NodeError::Conflict { .. }));
    }

    #[test]
    fn malformed_user_properties_is_rejected() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        let edge = NewEdge {
            user_properties: Some("[\"not\", \"an\", \"object\"]"),
            ..new_edge("to-a", "other-1")
        };
        let err = EdgeRepository::add(conn, edge).unwrap_err();
        assert!(matches!(err, NodeError::Validation { .. }));
    }

    #[test]
    fn wellformed_user_properties_is_accepted() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        let edge = NewEdge {
            user_properties: Some(r#"{"source": "census"}"#),
            ..new_edge("to-a", "other-1")
        };
        let id = EdgeRepository::add(conn, edge).unwrap();
        assert_eq!(
            EdgeRepository::get(conn, id).unwrap().unwrap().user_properties.as_deref(),
            Some(r#"{"source": "census"}"#)
        );
    }
}
