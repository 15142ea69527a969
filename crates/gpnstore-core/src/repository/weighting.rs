//! Weighting repository.
//!
//! A weighting is a named, optionally-described weight schema with a
//! selector array and a derived `is_complete` flag. Per the decided open
//! question (SPEC_FULL.md §9), completeness means every row in
//! `node_index` -- including `partial` cells and the reserved cell 0 --
//! has a weight under this weighting; `recompute_is_complete` is the
//! single place that truth is derived and stored.

use rusqlite::{Connection, OptionalExtension};

use crate::constraints::validate_json_array_of_strings;
use crate::error::{NodeError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Weighting {
    pub weighting_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub selectors: Option<String>,
    pub is_complete: bool,
}

pub struct WeightingRepository;

impl WeightingRepository {
    pub fn add(
        conn: &Connection,
        name: &str,
        description: Option<&str>,
        selectors: Option<&str>,
    ) -> Result<i64> {
        if let Some(selectors) = selectors {
            validate_json_array_of_strings(selectors)?;
        }
        conn.execute(
            "INSERT INTO weighting (name, description, selectors, is_complete) VALUES (?1, ?2, ?3, 0)",
            rusqlite::params![name, description, selectors],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                NodeError::conflict(format!("weighting name {name:?} already exists"))
            }
            other => NodeError::from(other),
        })?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, weighting_id: i64) -> Result<Option<Weighting>> {
        conn.query_row(
            "SELECT weighting_id, name, description, selectors, is_complete \
             FROM weighting WHERE weighting_id = ?1",
            [weighting_id],
            Self::from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<Weighting>> {
        conn.query_row(
            "SELECT weighting_id, name, description, selectors, is_complete \
             FROM weighting WHERE name = ?1",
            [name],
            Self::from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn update(
        conn: &Connection,
        weighting_id: i64,
        description: Option<&str>,
        selectors: Option<&str>,
    ) -> Result<()> {
        if let Some(selectors) = selectors {
            validate_json_array_of_strings(selectors)?;
        }
        let changed = conn.execute(
            "UPDATE weighting SET description = ?1, selectors = ?2 WHERE weighting_id = ?3",
            rusqlite::params![description, selectors, weighting_id],
        )?;
        if changed == 0 {
            return Err(NodeError::not_found("weighting", weighting_id));
        }
        Ok(())
    }

    pub fn delete(conn: &Connection, weighting_id: i64) -> Result<()> {
        let changed = conn.execute("DELETE FROM weighting WHERE weighting_id = ?1", [weighting_id])?;
        if changed == 0 {
            return Err(NodeError::not_found("weighting", weighting_id));
        }
        Ok(())
    }

    /// Recompute and persist `is_complete`: true iff every `node_index` row
    /// has a weight under this weighting. Called after weight insert/delete
    /// and after cell insert/delete, per the weighting state machine.
    pub fn recompute_is_complete(conn: &Connection, weighting_id: i64) -> Result<bool> {
        let total_cells: i64 = conn.query_row("SELECT COUNT(*) FROM node_index", [], |row| row.get(0))?;
        let weighted_cells: i64 = conn.query_row(
            "SELECT COUNT(*) FROM weight WHERE weighting_id = ?1",
            [weighting_id],
            |row| row.get(0),
        )?;
        let complete = total_cells > 0 && total_cells == weighted_cells;
        conn.execute(
            "UPDATE weighting SET is_complete = ?1 WHERE weighting_id = ?2",
            rusqlite::params![complete as i64, weighting_id],
        )?;
        Ok(complete)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Weighting> {
        Ok(Weighting {
            weighting_id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            selectors: row.get(3)?,
            is_complete: row.get::<_, i64>(4)? != 0,
        })
    }
}
