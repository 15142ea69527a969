//! Quantity repository.
//!
//! A quantity is a numeric value anchored at `(location, attribute)`, with
//! no uniqueness constraint across that pair -- multiple quantities may
//! coexist for the same location and attribute (e.g. repeated
//! observations).

use rusqlite::{Connection, OptionalExtension};

use crate::error::{NodeError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub quantity_id: i64,
    pub location_id: Option<i64>,
    pub attribute_id: Option<i64>,
    pub value: f64,
}

pub struct QuantityRepository;

impl QuantityRepository {
    pub fn add(
        conn: &Connection,
        location_id: Option<i64>,
        attribute_id: Option<i64>,
        value: f64,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO quantity (_location_id, attribute_id, quantity_value) VALUES (?1, ?2, ?3)",
            rusqlite::params![location_id, attribute_id, value],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, quantity_id: i64) -> Result<Option<Quantity>> {
        conn.query_row(
            "SELECT quantity_id, _location_id, attribute_id, quantity_value \
             FROM quantity WHERE quantity_id = ?1",
            [quantity_id],
            |row| {
                Ok(Quantity {
                    quantity_id: row.get(0)?,
                    location_id: row.get(1)?,
                    attribute_id: row.get(2)?,
                    value: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn update(conn: &Connection, quantity_id: i64, value: f64) -> Result<()> {
        let changed = conn.execute(
            "UPDATE quantity SET quantity_value = ?1 WHERE quantity_id = ?2",
            rusqlite::params![value, quantity_id],
        )?;
        if changed == 0 {
            return Err(NodeError::not_found("quantity", quantity_id));
        }
        Ok(())
    }

    pub fn delete(conn: &Connection, quantity_id: i64) -> Result<()> {
        let changed = conn.execute("DELETE FROM quantity WHERE quantity_id = ?1", [quantity_id])?;
        if changed == 0 {
            return Err(NodeError::not_found("quantity", quantity_id));
        }
        Ok(())
    }

    pub fn list_for_location(conn: &Connection, location_id: i64) -> Result<Vec<Quantity>> {
        let mut stmt = conn.prepare(
            "SELECT quantity_id, _location_id, attribute_id, quantity_value \
             FROM quantity WHERE _location_id = ?1",
        )?;
        let rows = stmt
            .query_map([location_id], |row| {
                Ok(Quantity {
                    quantity_id: row.get(0)?,
                    location_id: row.get(1)?,
                    attribute_id: row.get(2)?,
                    value: row.get(3)?,
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
    use crate::repository::attribute::AttributeRepository;
    use crate::repository::location::LocationRepository;

    #[test]
    fn multiple_quantities_coexist_for_same_location_and_attribute() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        let location_id = LocationRepository::add(conn, &Default::default()).unwrap();
        let attribute_id = AttributeRepository::intern(conn, r#"{"unit":"people"}"#).unwrap();

        let q1 = QuantityRepository::add(conn, Some(location_id), Some(attribute_id), 10.0).unwrap();
        let q2 = QuantityRepository::add(conn, Some(location_id), Some(attribute_id), 20.0).unwrap();
        assert_ne!(q1, q2);

        let rows = QuantityRepository::list_for_location(conn, location_id).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn update_and_delete_roundtrip() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        let location_id = LocationRepository::add(conn, &Default::default()).unwrap();
        let id = QuantityRepository::add(conn, Some(location_id), None, 1.5).unwrap();

        QuantityRepository::update(conn, id, 2.5).unwrap();
        assert_eq!(QuantityRepository::get(conn, id).unwrap().unwrap().value, 2.5);

        QuantityRepository::delete(conn, id).unwrap();
        assert!(QuantityRepository::get(conn, id).unwrap().is_none());
        assert!(QuantityRepository::delete(conn, id).is_err());
    }
}
