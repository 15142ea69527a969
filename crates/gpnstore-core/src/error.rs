//! Typed error kinds surfaced by every layer of the storage engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Every failure mode the storage engine can report to a caller.
///
/// Variants map directly onto the error kinds of the design: callers match
/// on the kind rather than parse a message, and each variant carries enough
/// structured context (identifier, constraint name, entity id) to act on.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Caller-supplied data violates a stated invariant.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// A requested id or key does not exist.
    #[error("not found: {what} {id}")]
    NotFound { what: &'static str, id: String },

    /// A uniqueness collision (duplicate hierarchy name, default-edge
    /// collision, weight collision, ...).
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// The operation is not applicable in the current schema state.
    #[error("schema state error: {message}")]
    SchemaState { message: String },

    /// A foreign-key violation or other storage-level invariant breach,
    /// typically discovered during or after a column rebuild.
    #[error("storage integrity violation: {message}")]
    StorageIntegrity { message: String },

    /// The opened file does not look like a node file.
    #[error("not a node file: {path} ({reason})")]
    NotANode { path: PathBuf, reason: String },

    /// The node file's schema version is outside the range this engine
    /// supports.
    #[error("unsupported schema version: {found} (expected {expected})")]
    SchemaVersionUnsupported { found: String, expected: String },

    /// A write was attempted against a read-only session.
    #[error("session is read-only")]
    Readonly,

    /// A retryable storage error (lock contention, busy database, ...).
    #[error("transient storage error: {0}")]
    Transient(String),

    /// Lower-level SQLite driver failure with no more specific mapping.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// JSON encode/decode failure on a JSON-typed column.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// I/O failure opening, copying, or removing a node file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NodeError {
    pub fn validation(message: impl Into<String>) -> Self {
        NodeError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(what: &'static str, id: impl std::fmt::Display) -> Self {
        NodeError::NotFound {
            what,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        NodeError::Conflict {
            message: message.into(),
        }
    }

    pub fn schema_state(message: impl Into<String>) -> Self {
        NodeError::SchemaState {
            message: message.into(),
        }
    }

    pub fn storage_integrity(message: impl Into<String>) -> Self {
        NodeError::StorageIntegrity {
            message: message.into(),
        }
    }
}
