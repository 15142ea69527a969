//! Storage Kernel: open/create a node file, manage PRAGMA posture, and hand
//! out transaction and savepoint scopes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::kernel::schema_sql::{
    APPLICATION_ID, PROPERTY_KEY_SCHEMA_VERSION, PROPERTY_KEY_UNIQUE_ID, REQUIRED_TABLES,
    SCHEMA_CREATE_ALL, SCHEMA_VERSION,
};

/// How a node file is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the file if absent; open read-write if present.
    ReadWriteCreate,
    /// Open an existing file read-write; fail if absent.
    ReadWrite,
    /// Open an existing file read-only.
    ReadOnly,
    /// A fresh, private, in-memory node.
    InMemory,
    /// A fresh node backed by a private temporary file on disk, removed
    /// when the session is dropped along with the underlying connection.
    TemporaryFile,
}

/// An open handle to one node's backing store.
///
/// A `Session` owns the single `rusqlite::Connection` for a node. Per the
/// single-writer, single-session concurrency model, a node has at most one
/// `Session` in this process at a time; nothing here prevents opening the
/// same path twice, but doing so is unsupported and the resulting
/// behaviour is whatever SQLite's own locking produces.
pub struct Session {
    conn: Connection,
    path: Option<PathBuf>,
    read_only: bool,
    savepoint_counter: AtomicU64,
}

impl Session {
    /// Open or create a node file at `path` under `mode`.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, config: &NodeConfig) -> Result<Self> {
        let path = path.as_ref();
        match mode {
            OpenMode::ReadWriteCreate => {
                let exists = path.exists();
                let conn = Connection::open(path)?;
                let mut session = Session {
                    conn,
                    path: Some(path.to_path_buf()),
                    read_only: false,
                    savepoint_counter: AtomicU64::new(0),
                };
                session.configure_connection(config)?;
                if exists {
                    session.validate_schema()?;
                } else {
                    session.create_schema()?;
                }
                Ok(session)
            }
            OpenMode::ReadWrite => {
                if !path.exists() {
                    return Err(NodeError::NotANode {
                        path: path.to_path_buf(),
                        reason: "file does not exist".to_string(),
                    });
                }
                let conn = Connection::open(path)?;
                let mut session = Session {
                    conn,
                    path: Some(path.to_path_buf()),
                    read_only: false,
                    savepoint_counter: AtomicU64::new(0),
                };
                session.configure_connection(config)?;
                session.validate_schema()?;
                Ok(session)
            }
            OpenMode::ReadOnly => {
                if !path.exists() {
                    return Err(NodeError::NotANode {
                        path: path.to_path_buf(),
                        reason: "file does not exist".to_string(),
                    });
                }
                let conn = Connection::open(path)?;
                let mut session = Session {
                    conn,
                    path: Some(path.to_path_buf()),
                    read_only: true,
                    savepoint_counter: AtomicU64::new(0),
                };
                session.configure_connection(config)?;
                session.conn.pragma_update(None, "query_only", true)?;
                session.validate_schema()?;
                Ok(session)
            }
            OpenMode::InMemory => {
                let conn = Connection::open_in_memory()?;
                let mut session = Session {
                    conn,
                    path: None,
                    read_only: false,
                    savepoint_counter: AtomicU64::new(0),
                };
                session.configure_connection(config)?;
                session.create_schema()?;
                Ok(session)
            }
            OpenMode::TemporaryFile => {
                // An empty path tells SQLite to back the database with a
                // private temporary file that is removed when closed.
                let conn = Connection::open("")?;
                let mut session = Session {
                    conn,
                    path: None,
                    read_only: false,
                    savepoint_counter: AtomicU64::new(0),
                };
                session.configure_connection(config)?;
                session.create_schema()?;
                Ok(session)
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn configure_connection(&mut self, config: &NodeConfig) -> Result<()> {
        self.conn
            .pragma_update(None, "journal_mode", config.journal_mode.as_pragma_value())?;
        self.conn
            .pragma_update(None, "synchronous", config.synchronous.as_pragma_value())?;
        self.conn
            .pragma_update(None, "cache_size", config.cache_size)?;
        self.conn
            .pragma_update(None, "temp_store", config.temp_store.as_pragma_value())?;
        self.conn
            .pragma_update(None, "busy_timeout", config.busy_timeout_ms)?;
        self.conn.pragma_update(None, "foreign_keys", true)?;
        debug!("session connection configured");
        Ok(())
    }

    /// Create the schema for a brand-new node file: all required tables,
    /// the application id magic value, the reserved cell 0, and the
    /// mandatory property rows.
    fn create_schema(&mut self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for stmt in SCHEMA_CREATE_ALL {
            tx.execute(stmt, [])?;
        }
        tx.pragma_update(None, "application_id", APPLICATION_ID)?;
        tx.execute(
            "INSERT INTO node_index (index_id, partial) VALUES (0, 0)",
            [],
        )?;
        let unique_id = uuid::Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO property (key, value) VALUES (?1, ?2)",
            rusqlite::params![PROPERTY_KEY_UNIQUE_ID, serde_json::Value::String(unique_id).to_string()],
        )?;
        tx.execute(
            "INSERT INTO property (key, value) VALUES (?1, ?2)",
            rusqlite::params![
                PROPERTY_KEY_SCHEMA_VERSION,
                serde_json::Value::String(SCHEMA_VERSION.to_string()).to_string()
            ],
        )?;
        tx.execute(
            "INSERT INTO property (key, value) VALUES (?1, ?2)",
            rusqlite::params![
                crate::kernel::schema_sql::PROPERTY_KEY_APP_VERSION,
                serde_json::Value::String(env!("CARGO_PKG_VERSION").to_string()).to_string()
            ],
        )?;
        tx.commit()?;
        info!("created new node schema");
        Ok(())
    }

    /// Validate that an existing file looks like a node: required tables
    /// present, `unique_id` property present, schema version recognised.
    fn validate_schema(&self) -> Result<()> {
        let path = self.path.clone().unwrap_or_default();
        for table in REQUIRED_TABLES {
            let present: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .optional()?;
            if present.is_none() {
                return Err(NodeError::NotANode {
                    path,
                    reason: format!("missing required table {table:?}"),
                });
            }
        }
        let unique_id: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM property WHERE key = ?1",
                [PROPERTY_KEY_UNIQUE_ID],
                |row| row.get(0),
            )
            .optional()?;
        if unique_id.is_none() {
            return Err(NodeError::NotANode {
                path,
                reason: "missing unique_id property".to_string(),
            });
        }
        let version: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM property WHERE key = ?1",
                [PROPERTY_KEY_SCHEMA_VERSION],
                |row| row.get(0),
            )
            .optional()?;
        let version = match version {
            Some(v) => v,
            None => {
                return Err(NodeError::NotANode {
                    path,
                    reason: "missing toron_schema_version property".to_string(),
                })
            }
        };
        let version: String = serde_json::from_str(&version).unwrap_or(version);
        if version != SCHEMA_VERSION {
            return Err(NodeError::SchemaVersionUnsupported {
                found: version,
                expected: SCHEMA_VERSION.to_string(),
            });
        }
        Ok(())
    }

    /// Begin an explicit transaction. A named savepoint can only be opened
    /// while one of these is open (see `savepoint`).
    pub fn transaction(&self) -> Result<rusqlite::Transaction<'_>> {
        if self.read_only {
            return Err(NodeError::Readonly);
        }
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Begin a named savepoint. The name is generated from a monotonic
    /// per-session counter so nested scopes never collide.
    ///
    /// Requires the connection to already be in an explicit transaction
    /// (see `transaction`); refuses to open a savepoint directly against
    /// autocommit, mirroring the reference implementation's savepoint
    /// context manager, which requires the connection to be under the
    /// caller's explicit transaction control rather than the driver's
    /// own implicit one.
    ///
    /// Released on `Savepoint::release`, rolled back on
    /// `Savepoint::rollback` or on drop without an explicit outcome.
    pub fn savepoint(&self) -> Result<Savepoint<'_>> {
        if self.read_only {
            return Err(NodeError::Readonly);
        }
        if self.conn.is_autocommit() {
            return Err(NodeError::schema_state(
                "a named savepoint requires an explicit transaction to already be open",
            ));
        }
        let name = format!("svpnt{}", self.savepoint_counter.fetch_add(1, Ordering::SeqCst));
        self.conn
            .execute_batch(&format!("SAVEPOINT {name}"))?;
        debug!(savepoint = %name, "savepoint opened");
        Ok(Savepoint {
            conn: &self.conn,
            name,
            finished: false,
        })
    }

    pub fn foreign_key_check(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("PRAGMA foreign_key_check")?;
        let mut violations = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let table: String = row.get(0)?;
            violations.push(table);
        }
        Ok(violations)
    }
}

/// RAII guard for a named `SAVEPOINT`/`RELEASE`/`ROLLBACK TO` scope.
///
/// Mirrors the context-manager pattern used upstream: on success the
/// caller calls `release`; on any error path the guard's `Drop`
/// implementation rolls back to the savepoint if no explicit outcome was
/// recorded, so a `?` early return always leaves the database consistent.
pub struct Savepoint<'c> {
    conn: &'c Connection,
    name: String,
    finished: bool,
}

impl<'c> Savepoint<'c> {
    pub fn release(mut self) -> Result<()> {
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {}", self.name))?;
        self.finished = true;
        debug!(savepoint = %self.name, "savepoint released");
        Ok(())
    }

    /// Roll back to the savepoint and release it. `ROLLBACK TO` alone
    /// undoes the savepoint's writes but leaves it open on the savepoint
    /// stack; without the following `RELEASE` the enclosing transaction
    /// would stay open after this scope ends.
    pub fn rollback(mut self) -> Result<()> {
        self.conn
            .execute_batch(&format!("ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}", self.name))?;
        self.finished = true;
        debug!(savepoint = %self.name, "savepoint rolled back");
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}",
                self.name
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_session_creates_schema() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let count: i64 = session
            .connection()
            .query_row("SELECT COUNT(*) FROM node_index", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1); // reserved cell 0 only
    }

    #[test]
    fn read_write_create_rejects_reopen_of_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_node.sqlite");
        std::fs::write(&path, b"not a sqlite file at all, long enough to parse as header").unwrap();
        let result = Session::open(&path, OpenMode::ReadWriteCreate, &NodeConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn savepoint_rolls_back_on_drop() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let tx = session.transaction().unwrap();
        {
            let sp = session.savepoint().unwrap();
            sp.conn
                .execute("UPDATE node_index SET partial = 1 WHERE index_id = 0", [])
                .unwrap();
            // dropped without release -> rolled back
        }
        tx.commit().unwrap();
        let partial: i64 = session
            .connection()
            .query_row(
                "SELECT partial FROM node_index WHERE index_id = 0",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(partial, 0);
    }

    #[test]
    fn savepoint_outside_a_transaction_is_refused() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let result = session.savepoint();
        assert!(matches!(result, Err(NodeError::SchemaState { .. })));
    }
}
