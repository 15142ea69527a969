//! Relation repository.
//!
//! A relation is one row of an edge: a mapping from an other-node cell to
//! a local cell, carrying a non-negative value, an optional proportion in
//! `[0,1]`, and the mapping-level bit-flag blob that recorded how the row
//! was resolved (`crate::ingestion::mapping`). Uniqueness is per
//! `(edge, other-cell, local-cell)`.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{NodeError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub relation_id: i64,
    pub edge_id: Option<i64>,
    pub other_index_id: i64,
    pub index_id: Option<i64>,
    pub value: f64,
    pub proportion: Option<f64>,
    pub mapping_level: Option<Vec<u8>>,
}

pub struct RelationRepository;

impl RelationRepository {
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        conn: &Connection,
        edge_id: Option<i64>,
        other_index_id: i64,
        index_id: Option<i64>,
        value: f64,
        proportion: Option<f64>,
        mapping_level: Option<&[u8]>,
    ) -> Result<i64> {
        if value < 0.0 {
            return Err(NodeError::validation("relation value must be >= 0"));
        }
        if let Some(p) = proportion {
            if !(0.0..=1.0).contains(&p) {
                return Err(NodeError::validation("relation proportion must be in [0, 1]"));
            }
        }
        conn.execute(
            "INSERT INTO relation (edge_id, other_index_id, index_id, relation_value, proportion, mapping_level) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![edge_id, other_index_id, index_id, value, proportion, mapping_level],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                NodeError::conflict(format!(
                    "relation already exists for edge {edge_id:?}, other cell {other_index_id}, local cell {index_id:?}"
                ))
            }
            other => NodeError::from(other),
        })?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, relation_id: i64) -> Result<Option<Relation>> {
        conn.query_row(
            "SELECT relation_id, edge_id, other_index_id, index_id, relation_value, proportion, mapping_level \
             FROM relation WHERE relation_id = ?1",
            [relation_id],
            Self::from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn list_for_edge(conn: &Connection, edge_id: i64) -> Result<Vec<Relation>> {
        let mut stmt = conn.prepare(
            "SELECT relation_id, edge_id, other_index_id, index_id, relation_value, proportion, mapping_level \
             FROM relation WHERE edge_id = ?1",
        )?;
        let rows = stmt
            .query_map([edge_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn update_proportion(conn: &Connection, relation_id: i64, proportion: Option<f64>) -> Result<()> {
        if let Some(p) = proportion {
            if !(0.0..=1.0).contains(&p) {
                return Err(NodeError::validation("relation proportion must be in [0, 1]"));
            }
        }
        let changed = conn.execute(
            "UPDATE relation SET proportion = ?1 WHERE relation_id = ?2",
            rusqlite::params![proportion, relation_id],
        )?;
        if changed == 0 {
            return Err(NodeError::not_found("relation", relation_id));
        }
        Ok(())
    }

    pub fn delete(conn: &Connection, relation_id: i64) -> Result<()> {
        let changed = conn.execute("DELETE FROM relation WHERE relation_id = ?1", [relation_id])?;
        if changed == 0 {
            return Err(NodeError::not_found("relation", relation_id));
        }
        Ok(())
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Relation> {
        Ok(Relation {
            relation_id: row.get(0)?,
            edge_id: row.get(1)?,
            other_index_id: row.get(2)?,
            index_id: row.get(3)?,
            value: row.get(4)?,
            proportion: row.get(5)?,
            mapping_level: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};

    #[test]
    fn rejects_negative_value() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        let err = RelationRepository::add(conn, None, 1, Some(0), -1.0, None, None).unwrap_err();
        assert!(matches!(err, NodeError::Validation { .. }));
    }

    #[test]
    fn rejects_out_of_range_proportion() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        let err = RelationRepository::add(conn, None, 1, Some(0), 1.0, Some(1.5), None).unwrap_err();
        assert!(matches!(err, NodeError::Validation { .. }));
    }

    #[test]
    fn add_and_get_round_trips() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        let id = RelationRepository::add(conn, None, 7, Some(0), 3.5, Some(0.5), Some(&[0b1010_0000])).unwrap();
        let relation = RelationRepository::get(conn, id).unwrap().unwrap();
        assert_eq!(relation.other_index_id, 7);
        assert_eq!(relation.value, 3.5);
        assert_eq!(relation.mapping_level, Some(vec![0b1010_0000]));
    }
}
