//! Mapping-level resolution: matching a correspondence row's right-side
//! label values against this node's granularity lattice (`structure`).
//!
//! A mapping row's right-side header may name any subset of this node's
//! label columns, in any order. To compare it against a `structure` row
//! (whose present/absent flags are always in this node's canonical rank
//! order) the row's non-empty columns are first re-expressed as a bit-flag
//! blob over that same canonical order.

use rusqlite::Connection;

use crate::bitflag::BitFlags;
use crate::error::{NodeError, Result};
use crate::repository::ranked_hierarchy;
use crate::repository::structure::{Structure, StructureRepository};

/// Re-express a mapping row's right-side `(header, values)` as a bit-flag
/// blob over this node's canonical label-column order: bit `i` set iff the
/// column at canonical rank `i` is named in `header` with a non-empty
/// value.
///
/// Header names not recognised as one of this node's label columns are a
/// validation error -- the caller's right-side header must be a subset of
/// this node's hierarchy.
pub fn row_bit_flags(conn: &Connection, header: &[String], values: &[String]) -> Result<BitFlags> {
    if header.len() != values.len() {
        return Err(NodeError::validation(
            "mapping row header and value counts differ",
        ));
    }
    let ranked = ranked_hierarchy(conn)?;
    let mut flags = BitFlags::zeros(ranked.len());
    for (name, value) in header.iter().zip(values.iter()) {
        let canonical_index = ranked
            .iter()
            .position(|(ranked_name, _)| ranked_name == name)
            .ok_or_else(|| NodeError::validation(format!("{name:?} is not a label column on this node")))?;
        if !value.is_empty() {
            flags.set(canonical_index);
        }
    }
    Ok(flags)
}

/// Find the structure entry compatible with `present` -- one whose present
/// flags are exactly equal -- searching most-granular first. `None` if no
/// structure entry matches; downstream code treats that as a relation to
/// the reserved undefined cell (id 0).
pub fn resolve_structure(conn: &Connection, present: &BitFlags) -> Result<Option<Structure>> {
    let candidates = StructureRepository::list_most_granular_first(conn)?;
    Ok(candidates.into_iter().find(|s| &s.present == present))
}

/// Resolve one mapping row: build its bit-flag blob from the right-side
/// `(header, values)` and find the compatible structure entry, if any.
pub fn resolve_row(
    conn: &Connection,
    right_header: &[String],
    right_values: &[String],
) -> Result<(BitFlags, Option<Structure>)> {
    let present = row_bit_flags(conn, right_header, right_values)?;
    let structure = resolve_structure(conn, &present)?;
    Ok((present, structure))
}
