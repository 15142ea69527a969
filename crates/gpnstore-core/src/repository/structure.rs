//! Structure repository.
//!
//! A structure row is a bitmask over the label columns (stored as one
//! `0`/`1` integer column per level, mirroring `node_index`) marking which
//! subset of levels is "present" for one granularity class, plus an
//! application-computed `_granularity` scalar ordering classes from least
//! to most specific. Mapping-level resolution (`crate::ingestion`) walks
//! these rows most-granular first looking for a compatible match.

use rusqlite::Connection;

use crate::bitflag::BitFlags;
use crate::error::{NodeError, Result};
use crate::identifier::quote_identifier;
use crate::repository::ranked_hierarchy;

#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub structure_id: i64,
    pub granularity: Option<f64>,
    /// Present/absent per label column, in rank order.
    pub present: BitFlags,
}

pub struct StructureRepository;

impl StructureRepository {
    /// Insert a structure row from a present/absent flag per label column
    /// (rank order) and its granularity scalar.
    pub fn add(conn: &Connection, present: &BitFlags, granularity: Option<f64>) -> Result<i64> {
        let ranked = ranked_hierarchy(conn)?;
        if present.len() != ranked.len() {
            return Err(NodeError::validation(format!(
                "structure flag count {} does not match {} label columns",
                present.len(),
                ranked.len()
            )));
        }
        let columns: Vec<String> = ranked.iter().map(|(name, _)| quote_identifier(name)).collect();
        let values: Vec<i64> = (0..ranked.len()).map(|i| present.get(i) as i64).collect();
        if columns.is_empty() {
            conn.execute(
                "INSERT INTO structure (_granularity) VALUES (?1)",
                [granularity],
            )?;
        } else {
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
            let mut params: Vec<Box<dyn rusqlite::ToSql>> =
                values.iter().map(|v| Box::new(*v) as Box<dyn rusqlite::ToSql>).collect();
            params.push(Box::new(granularity));
            conn.execute(
                &format!(
                    "INSERT INTO structure ({}, _granularity) VALUES ({}, ?{})",
                    columns.join(", "),
                    placeholders.join(", "),
                    values.len() + 1
                ),
                rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
            )?;
        }
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, structure_id: i64) -> Result<Option<Structure>> {
        let all = Self::list_most_granular_first(conn)?;
        Ok(all.into_iter().find(|s| s.structure_id == structure_id))
    }

    pub fn delete(conn: &Connection, structure_id: i64) -> Result<()> {
        let changed = conn.execute("DELETE FROM structure WHERE _structure_id = ?1", [structure_id])?;
        if changed == 0 {
            return Err(NodeError::not_found("structure", structure_id));
        }
        Ok(())
    }

    /// All structure rows, most-granular first (highest `_granularity`
    /// first; nulls sort last), per the mapping-resolution algorithm's
    /// match order.
    pub fn list_most_granular_first(conn: &Connection) -> Result<Vec<Structure>> {
        let ranked = ranked_hierarchy(conn)?;
        let select_list = ranked
            .iter()
            .map(|(name, _)| quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ");
        let query = if ranked.is_empty() {
            "SELECT _structure_id, _granularity FROM structure \
             ORDER BY _granularity IS NULL, _granularity DESC"
                .to_string()
        } else {
            format!(
                "SELECT _structure_id, _granularity, {select_list} FROM structure \
                 ORDER BY _granularity IS NULL, _granularity DESC"
            )
        };
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt
            .query_map([], |row| {
                let structure_id: i64 = row.get(0)?;
                let granularity: Option<f64> = row.get(1)?;
                let mut flags = BitFlags::zeros(ranked.len());
                for i in 0..ranked.len() {
                    let present: i64 = row.get(i + 2)?;
                    if present != 0 {
                        flags.set(i);
                    }
                }
                Ok(Structure {
                    structure_id,
                    granularity,
                    present: flags,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};
    use crate::schema::column_manager::add_columns;

    #[test]
    fn list_orders_most_granular_first() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        add_columns(conn, &["state".to_string(), "county".to_string()]).unwrap();
        StructureRepository::add(conn, &BitFlags::from_flags(&[true, false]), Some(1.0)).unwrap();
        StructureRepository::add(conn, &BitFlags::from_flags(&[true, true]), Some(2.0)).unwrap();
        let rows = StructureRepository::list_most_granular_first(conn).unwrap();
        assert_eq!(rows[0].granularity, Some(2.0));
        assert_eq!(rows[1].granularity, Some(1.0));
    }
}
