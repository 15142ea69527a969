//! Repository Layer: one typed CRUD namespace per entity kind, each
//! operating against a single open `rusqlite::Connection`/transaction.
//!
//! None of these types open a connection or manage its lifecycle -- that's
//! the kernel's job (`crate::kernel`). A repository is a thin, stateless
//! wrapper around a `&Connection` passed in by the caller for the duration
//! of one call; nothing here performs an implicit commit.

pub mod attribute;
pub mod cell;
pub mod edge;
pub mod hierarchy;
pub mod label;
pub mod location;
pub mod property;
pub mod quantity;
pub mod relation;
pub mod structure;
pub mod weight;
pub mod weighting;

/// Ranked (name, hierarchy_id) pairs, rank 0 (root) first. Shared by the
/// cell, location, and structure repositories, which all iterate label
/// columns in the same canonical order.
pub(crate) fn ranked_hierarchy(
    conn: &rusqlite::Connection,
) -> crate::error::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare("SELECT level_name, hierarchy_id FROM hierarchy ORDER BY level_rank ASC")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
