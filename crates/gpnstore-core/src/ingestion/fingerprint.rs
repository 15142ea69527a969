//! Content-hash fingerprinting.
//!
//! Collects every `(cell_id, hierarchy_id, label_value)` triple a node's
//! cells carry, sorts them, and hashes the concatenation with SHA-256. Only
//! `hierarchy_id` (the stable surrogate key) participates, never the level
//! name or rank, so the hash is invariant under renaming and reordering of
//! hierarchy levels (P6).

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::identifier::quote_identifier;
use crate::repository::ranked_hierarchy;

/// Every `(cell_id, hierarchy_id, label_value)` triple currently in the
/// node, unsorted.
fn collect_triples(conn: &rusqlite::Connection) -> Result<Vec<(i64, i64, String)>> {
    let ranked = ranked_hierarchy(conn)?;
    let mut triples = Vec::new();
    for (name, hierarchy_id) in &ranked {
        let quoted = quote_identifier(name);
        let query = format!(
            "SELECT ni.index_id, l.label_value FROM node_index ni \
             JOIN label l ON l.label_id = ni.{quoted}"
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (cell_id, label_value) in rows {
            triples.push((cell_id, *hierarchy_id, label_value));
        }
    }
    Ok(triples)
}

/// The node's content hash: hex-encoded SHA-256 over its sorted
/// `(cell_id, hierarchy_id, label_value)` triples, or `None` if the node
/// has no cells (reported as absent rather than the hash of the empty
/// string).
pub fn compute_content_hash(conn: &rusqlite::Connection) -> Result<Option<String>> {
    let mut triples = collect_triples(conn)?;
    if triples.is_empty() {
        return Ok(None);
    }
    triples.sort();
    let mut hasher = Sha256::new();
    for (cell_id, hierarchy_id, label_value) in &triples {
        hasher.update(cell_id.to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(hierarchy_id.to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(label_value.as_bytes());
        hasher.update(b"\n");
    }
    Ok(Some(format!("{:x}", hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::NodeConfig;
    use crate::kernel::{OpenMode, Session};
    use crate::repository::cell::CellRepository;
    use crate::repository::hierarchy::HierarchyRepository;

    #[test]
    fn empty_node_has_no_hash() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        assert_eq!(compute_content_hash(session.connection()).unwrap(), None);
    }

    #[test]
    fn hash_is_stable_under_hierarchy_rename() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        HierarchyRepository::add(conn, &["state".to_string(), "town".to_string()]).unwrap();
        CellRepository::insert_one_cell(
            conn,
            &BTreeMap::from([("state".to_string(), "OH".to_string()), ("town".to_string(), "Columbus".to_string())]),
        )
        .unwrap();
        let before = compute_content_hash(conn).unwrap();

        HierarchyRepository::rename(conn, &std::collections::HashMap::from([("town".to_string(), "locality".to_string())])).unwrap();
        let after = compute_content_hash(conn).unwrap();
        assert_eq!(before, after);
        assert!(before.is_some());
    }

    #[test]
    fn hash_changes_when_a_cell_is_added() {
        let session = Session::open("", OpenMode::InMemory, &NodeConfig::default()).unwrap();
        let conn = session.connection();
        HierarchyRepository::add(conn, &["state".to_string(), "county".to_string()]).unwrap();
        CellRepository::insert_one_cell(
            conn,
            &BTreeMap::from([("state".to_string(), "OH".to_string()), ("county".to_string(), "Franklin".to_string())]),
        )
        .unwrap();
        let first = compute_content_hash(conn).unwrap();
        CellRepository::insert_one_cell(
            conn,
            &BTreeMap::from([("state".to_string(), "OH".to_string()), ("county".to_string(), "Cuyahoga".to_string())]),
        )
        .unwrap();
        let second = compute_content_hash(conn).unwrap();
        assert_ne!(first, second);
    }
}
