//! Property repository.
//!
//! A simple string -> JSON key-value store. Holds the reserved keys
//! (`unique_id`, `toron_schema_version`, `toron_app_version`,
//! `content_hash`) alongside arbitrary user properties; reserved keys are
//! not given special storage, only special meaning to the kernel and
//! ingestion code that read and write them.

use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use crate::constraints::validate_json_wellformed;
use crate::error::Result;
use crate::kernel::schema_sql::PROPERTY_KEY_CONTENT_HASH;

pub struct PropertyRepository;

impl PropertyRepository {
    /// Set `key` to a raw JSON-encoded `value` (wellformedness checked,
    /// any shape). Upserts.
    pub fn set_raw(conn: &Connection, key: &str, value: &str) -> Result<()> {
        validate_json_wellformed(value)?;
        conn.execute(
            "INSERT INTO property (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    /// Convenience wrapper: JSON-encode `value` and store it.
    pub fn set(conn: &Connection, key: &str, value: &Value) -> Result<()> {
        Self::set_raw(conn, key, &value.to_string())
    }

    pub fn get_raw(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row("SELECT value FROM property WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    pub fn get(conn: &Connection, key: &str) -> Result<Option<Value>> {
        match Self::get_raw(conn, key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn delete(conn: &Connection, key: &str) -> Result<()> {
        conn.execute("DELETE FROM property WHERE key = ?1", [key])?;
        Ok(())
    }

    /// The node's current content-hash fingerprint, hex-encoded, or `None`
    /// if the node has no cells (absent per the fingerprinting rule) or has
    /// never been ingested into.
    pub fn get_content_hash(conn: &Connection) -> Result<Option<String>> {
        match Self::get(conn, PROPERTY_KEY_CONTENT_HASH)? {
            Some(Value::String(s)) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    pub fn set_content_hash(conn: &Connection, hash_hex: Option<&str>) -> Result<()> {
        match hash_hex {
            Some(hex) => Self::set(conn, PROPERTY_KEY_CONTENT_HASH, &Value::String(hex.to_string())),
            None => Self::delete(conn, PROPERTY_KEY_CONTENT_HASH),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};

    #[test]
    fn set_get_upserts() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        PropertyRepository::set(conn, "note", &Value::String("first".into())).unwrap();
        PropertyRepository::set(conn, "note", &Value::String("second".into())).unwrap();
        assert_eq!(
            PropertyRepository::get(conn, "note").unwrap(),
            Some(Value::String("second".into()))
        );
    }

    #[test]
    fn content_hash_absent_by_default() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        assert_eq!(PropertyRepository::get_content_hash(conn).unwrap(), None);
    }
}
