//! Weight repository.
//!
//! A weight is a real value attached to `(weighting, cell)`, unique per
//! pair. The `index_id` foreign key is declared `DEFERRABLE INITIALLY
//! DEFERRED` so weights may be bulk-loaded ahead of the cells they
//! reference within the same transaction -- the check only fires at
//! commit.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{NodeError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight {
    pub weight_id: i64,
    pub weighting_id: i64,
    pub index_id: i64,
    pub value: f64,
}

pub struct WeightRepository;

impl WeightRepository {
    pub fn add(conn: &Connection, weighting_id: i64, index_id: i64, value: f64) -> Result<i64> {
        conn.execute(
            "INSERT INTO weight (weighting_id, index_id, weight_value) VALUES (?1, ?2, ?3)",
            rusqlite::params![weighting_id, index_id, value],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                NodeError::conflict(format!(
                    "cell {index_id} already has a weight under weighting {weighting_id}"
                ))
            }
            other => NodeError::from(other),
        })?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, weighting_id: i64, index_id: i64) -> Result<Option<Weight>> {
        conn.query_row(
            "SELECT weight_id, weighting_id, index_id, weight_value \
             FROM weight WHERE weighting_id = ?1 AND index_id = ?2",
            rusqlite::params![weighting_id, index_id],
            |row| {
                Ok(Weight {
                    weight_id: row.get(0)?,
                    weighting_id: row.get(1)?,
                    index_id: row.get(2)?,
                    value: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn update(conn: &Connection, weighting_id: i64, index_id: i64, value: f64) -> Result<()> {
        let changed = conn.execute(
            "UPDATE weight SET weight_value = ?1 WHERE weighting_id = ?2 AND index_id = ?3",
            rusqlite::params![value, weighting_id, index_id],
        )?;
        if changed == 0 {
            return Err(NodeError::not_found("weight", format!("{weighting_id}/{index_id}")));
        }
        Ok(())
    }

    pub fn delete(conn: &Connection, weighting_id: i64, index_id: i64) -> Result<()> {
        let changed = conn.execute(
            "DELETE FROM weight WHERE weighting_id = ?1 AND index_id = ?2",
            rusqlite::params![weighting_id, index_id],
        )?;
        if changed == 0 {
            return Err(NodeError::not_found("weight", format!("{weighting_id}/{index_id}")));
        }
        Ok(())
    }
}
