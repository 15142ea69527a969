//! CLI command implementations.

pub mod ingest;
pub mod inspect;
pub mod new;

use gpnstore_core::NodeError;

/// Translate a core error into the stable, human-facing message this CLI
/// reports. The engine itself only produces typed errors; formatting them
/// for an operator is this crate's job, not the storage engine's.
pub fn describe_error(err: &NodeError) -> String {
    match err {
        NodeError::Validation { message } => format!("invalid input: {message}"),
        NodeError::NotFound { what, id } => format!("{what} not found: {id}"),
        NodeError::Conflict { message } => format!("conflict: {message}"),
        NodeError::SchemaState { message } => {
            format!("not allowed in the current schema: {message}")
        }
        NodeError::StorageIntegrity { message } => {
            format!("storage integrity violation: {message}")
        }
        NodeError::NotANode { path, reason } => {
            format!("{} is not a gpnstore node file: {reason}", path.display())
        }
        NodeError::SchemaVersionUnsupported { found, expected } => {
            format!("unsupported schema version {found} (expected {expected})")
        }
        NodeError::Readonly => "the node is open read-only".to_string(),
        NodeError::Transient(message) => format!("transient storage error, retry: {message}"),
        NodeError::Sqlite(source) => format!("sqlite error: {source}"),
        NodeError::Json(source) => format!("malformed JSON: {source}"),
        NodeError::Io(source) => format!("I/O error: {source}"),
    }
}
