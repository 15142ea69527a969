//! Label-column identifier validation and SQL quoting.
//!
//! Label column names become SQLite column identifiers. They must be
//! representable as a single, whitespace-normalised, NUL-free string
//! before they are safe to splice into DDL, and they must not collide
//! with the reserved row-id columns of the label-bearing tables.

use crate::error::{NodeError, Result};

/// Row-id columns on the three label-bearing tables; forbidden as labels.
pub const RESERVED_COLUMN_NAMES: &[&str] = &["index_id", "_location_id", "_structure_id"];

/// Hierarchy level names must not contain this literal token.
const FORBIDDEN_TOKEN: &str = "cell_id";

/// Validate a proposed hierarchy level / label column name against C6:
/// non-empty, no embedded NUL, no "cell_id" substring, no ".".
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(NodeError::validation("identifier must not be empty"));
    }
    if name.contains('\u{0}') {
        return Err(NodeError::validation(
            "identifier must not contain a NUL byte",
        ));
    }
    if name.contains(FORBIDDEN_TOKEN) {
        return Err(NodeError::validation(format!(
            "identifier {name:?} must not contain the reserved token {FORBIDDEN_TOKEN:?}"
        )));
    }
    if name.contains('.') {
        return Err(NodeError::validation(format!(
            "identifier {name:?} must not contain '.'"
        )));
    }
    if RESERVED_COLUMN_NAMES.contains(&name) {
        return Err(NodeError::validation(format!(
            "identifier {name:?} is reserved for a row id column"
        )));
    }
    Ok(())
}

/// Normalise an identifier the way the reference implementation does:
/// collapse any run of whitespace to a single space and trim the ends.
/// Applied before quoting, never silently applied to stored label values.
pub fn normalize_identifier(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Quote an identifier for use in DDL/DML: wrap in double quotes, doubling
/// any embedded double quote. Never use for untrusted label *values* --
/// this is for column/table identifiers only, which go through
/// `validate_identifier` first.
pub fn quote_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{escaped}\"")
}
