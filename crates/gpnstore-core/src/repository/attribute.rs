//! Attribute repository.
//!
//! An attribute is a JSON object of string->string pairs, interned by its
//! canonical (sorted-key) form: each distinct object has exactly one id.

use rusqlite::{Connection, OptionalExtension};

use crate::constraints::{canonicalize_json_object, validate_json_object_of_strings};
use crate::error::{NodeError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub attribute_id: i64,
    pub value: String,
}

pub struct AttributeRepository;

impl AttributeRepository {
    /// Intern `value` (a JSON object of string->string pairs), returning
    /// the id of the existing row if an equal canonical form is already
    /// stored, or a newly-assigned id otherwise.
    pub fn intern(conn: &Connection, value: &str) -> Result<i64> {
        validate_json_object_of_strings(value)?;
        let canonical = canonicalize_json_object(value)?;
        if let Some(existing) = Self::find(conn, &canonical)? {
            return Ok(existing.attribute_id);
        }
        conn.execute(
            "INSERT INTO attribute (attribute_value) VALUES (?1)",
            [&canonical],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find(conn: &Connection, canonical_value: &str) -> Result<Option<Attribute>> {
        conn.query_row(
            "SELECT attribute_id, attribute_value FROM attribute WHERE attribute_value = ?1",
            [canonical_value],
            |row| {
                Ok(Attribute {
                    attribute_id: row.get(0)?,
                    value: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn get(conn: &Connection, attribute_id: i64) -> Result<Option<Attribute>> {
        conn.query_row(
            "SELECT attribute_id, attribute_value FROM attribute WHERE attribute_id = ?1",
            [attribute_id],
            |row| {
                Ok(Attribute {
                    attribute_id: row.get(0)?,
                    value: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn delete(conn: &Connection, attribute_id: i64) -> Result<()> {
        let changed = conn.execute("DELETE FROM attribute WHERE attribute_id = ?1", [attribute_id])?;
        if changed == 0 {
            return Err(NodeError::not_found("attribute", attribute_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};

    #[test]
    fn interning_is_order_independent() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        let a = AttributeRepository::intern(conn, r#"{"b":"2","a":"1"}"#).unwrap();
        let b = AttributeRepository::intern(conn, r#"{"a":"1","b":"2"}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_non_string_values() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        assert!(AttributeRepository::intern(conn, r#"{"a":1}"#).is_err());
    }
}
