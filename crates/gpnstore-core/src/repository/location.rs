//! Location repository.
//!
//! A location is a generalised cell: it shares the same label columns as
//! `node_index`, but permits the empty string at finer levels ("not
//! specified at this level") rather than requiring a resolved label id at
//! every level. Locations anchor quantities; they do not participate in
//! C1/C3 (those are cell-only invariants).

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{NodeError, Result};
use crate::identifier::quote_identifier;
use crate::repository::ranked_hierarchy;

pub struct LocationRepository;

impl LocationRepository {
    /// Insert a location from a `hierarchy name -> value` mapping. Levels
    /// absent from the mapping default to the empty string.
    pub fn add(conn: &Connection, mapping: &BTreeMap<String, String>) -> Result<i64> {
        let ranked = ranked_hierarchy(conn)?;
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (name, _) in &ranked {
            if let Some(value) = mapping.get(name) {
                columns.push(quote_identifier(name));
                values.push(value.clone());
            }
        }
        if columns.is_empty() {
            conn.execute("INSERT INTO location DEFAULT VALUES", [])?;
        } else {
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
            conn.execute(
                &format!(
                    "INSERT INTO location ({}) VALUES ({})",
                    columns.join(", "),
                    placeholders.join(", ")
                ),
                rusqlite::params_from_iter(values.iter()),
            )?;
        }
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, location_id: i64) -> Result<Option<Vec<(String, String)>>> {
        let ranked = ranked_hierarchy(conn)?;
        if ranked.is_empty() {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT _location_id FROM location WHERE _location_id = ?1",
                    [location_id],
                    |row| row.get(0),
                )
                .optional()?;
            return Ok(exists.map(|_| Vec::new()));
        }
        let select_list = ranked
            .iter()
            .map(|(name, _)| quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ");
        let row: Option<Vec<String>> = conn
            .query_row(
                &format!("SELECT {select_list} FROM location WHERE _location_id = ?1"),
                [location_id],
                |row| {
                    (0..ranked.len())
                        .map(|i| row.get::<_, String>(i))
                        .collect::<rusqlite::Result<Vec<_>>>()
                },
            )
            .optional()?;
        Ok(row.map(|values| {
            ranked
                .iter()
                .map(|(name, _)| name.clone())
                .zip(values)
                .collect()
        }))
    }

    pub fn update(conn: &Connection, location_id: i64, mapping: &BTreeMap<String, String>) -> Result<()> {
        let ranked = ranked_hierarchy(conn)?;
        let mut sets = Vec::new();
        let mut values = Vec::new();
        for (name, _) in &ranked {
            if let Some(value) = mapping.get(name) {
                sets.push(format!("{} = ?{}", quote_identifier(name), values.len() + 1));
                values.push(value.clone());
            }
        }
        if sets.is_empty() {
            return Ok(());
        }
        values.push(location_id.to_string());
        let changed = conn.execute(
            &format!(
                "UPDATE location SET {} WHERE _location_id = ?{}",
                sets.join(", "),
                values.len()
            ),
            rusqlite::params_from_iter(values.iter()),
        )?;
        if changed == 0 {
            return Err(NodeError::not_found("location", location_id));
        }
        Ok(())
    }

    pub fn delete(conn: &Connection, location_id: i64) -> Result<()> {
        let changed = conn.execute("DELETE FROM location WHERE _location_id = ?1", [location_id])?;
        if changed == 0 {
            return Err(NodeError::not_found("location", location_id));
        }
        Ok(())
    }
}
