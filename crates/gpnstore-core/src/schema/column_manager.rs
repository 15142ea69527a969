//! Keeps the label columns of `node_index`, `location`, and `structure` in
//! lock-step: same names, same order, added/renamed/dropped atomically.
//!
//! Two implementations of rename/drop are provided behind one interface:
//! a native path using `ALTER TABLE ... RENAME/DROP COLUMN` when the
//! connection's SQLite build supports it, and a table-rebuild path
//! otherwise. Which one runs is decided at call time by a version probe,
//! never by a compile-time feature flag, because the *capability* is a
//! property of the linked SQLite library, not of this crate.

use std::collections::HashMap;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{NodeError, Result};
use crate::identifier::{normalize_identifier, quote_identifier, validate_identifier};
use crate::kernel::schema_sql::PLACEHOLDER_LABEL;

/// Columns present on `node_index` that are never label columns.
const NODE_INDEX_RESERVED: &[&str] = &["index_id", "partial"];
/// Columns present on `location` that are never label columns.
const LOCATION_RESERVED: &[&str] = &["_location_id"];
/// Columns present on `structure` that are never label columns.
const STRUCTURE_RESERVED: &[&str] = &["_structure_id", "_granularity"];

const LABEL_BEARING_TABLES: &[&str] = &["node_index", "location", "structure"];

/// Composite uniqueness index enforcing C1 (no two cells share a label
/// set). Dropped and recreated around every schema mutation that touches
/// `node_index`'s label columns, and around bulk ingestion (see
/// `drop_expensive_constraints`/`recreate_expensive_constraints`).
pub const NODE_INDEX_UNIQUE_INDEX: &str = "idx_node_index_unique_labels";
/// Composite uniqueness index over `structure`'s label-presence columns:
/// each granularity class is a distinct combination of present levels.
pub const STRUCTURE_UNIQUE_INDEX: &str = "idx_structure_unique_labels";

/// The minimum SQLite `ALTER TABLE` feature set this manager probes for:
/// native column rename (3.25.0+) and native column drop (3.35.0+).
fn sqlite_version(conn: &Connection) -> Result<(i64, i64, i64)> {
    let version: String = conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
    let mut parts = version.split('.').map(|p| p.parse::<i64>().unwrap_or(0));
    Ok((
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    ))
}

fn supports_native_rename(conn: &Connection) -> Result<bool> {
    Ok(sqlite_version(conn)? >= (3, 25, 0))
}

fn supports_native_drop(conn: &Connection) -> Result<bool> {
    Ok(sqlite_version(conn)? >= (3, 35, 0))
}

/// Get the ordered list of label column names, identical across all three
/// label-bearing tables by construction.
pub fn get_columns(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA table_info('node_index')")?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if !NODE_INDEX_RESERVED.contains(&name.as_str()) {
            columns.push(name);
        }
    }
    Ok(columns)
}

fn verify_foreign_key_check(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let mut rows = stmt.query([])?;
    let mut violations = Vec::new();
    while let Some(row) = rows.next()? {
        let table: String = row.get(0)?;
        violations.push(table);
        if violations.len() >= 10 {
            break;
        }
    }
    if !violations.is_empty() {
        return Err(NodeError::storage_integrity(format!(
            "foreign key check failed after column rebuild: {violations:?}"
        )));
    }
    Ok(())
}

/// Drop the composite uniqueness indexes over `node_index` and
/// `structure`'s label columns. A no-op if they don't currently exist
/// (e.g. before any label column has been added).
pub fn drop_unique_indexes(conn: &Connection) -> Result<()> {
    conn.execute(&format!("DROP INDEX IF EXISTS {NODE_INDEX_UNIQUE_INDEX}"), [])?;
    conn.execute(&format!("DROP INDEX IF EXISTS {STRUCTURE_UNIQUE_INDEX}"), [])?;
    Ok(())
}

/// Recreate the composite uniqueness indexes over the current label column
/// set. If rows already violate the constraint, `CREATE UNIQUE INDEX`
/// itself fails with a SQLite constraint error, which is how the caller
/// (ingestion's C1 recheck) detects a duplicate label set introduced
/// during a batch with constraints dropped.
///
/// Idempotent: drops its own indexes first, so calling this more than once
/// (e.g. once from `add_columns` reconciling the hierarchy, once more from
/// the caller's own post-load recheck) always re-validates the live table
/// instead of failing on "index already exists".
pub fn recreate_unique_indexes(conn: &Connection) -> Result<()> {
    drop_unique_indexes(conn)?;
    let columns = get_columns(conn)?;
    if columns.is_empty() {
        return Ok(());
    }
    let column_list = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute(
        &format!(
            "CREATE UNIQUE INDEX {NODE_INDEX_UNIQUE_INDEX} ON node_index ({column_list})"
        ),
        [],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            NodeError::validation("duplicate label set")
        }
        other => NodeError::from(other),
    })?;
    conn.execute(
        &format!("CREATE UNIQUE INDEX {STRUCTURE_UNIQUE_INDEX} ON structure ({column_list})"),
        [],
    )?;
    Ok(())
}

/// Intern the placeholder label `"-"` for a hierarchy level, returning its
/// label id, inserting it if this is the first time the level is seen.
fn placeholder_label_id(conn: &Connection, hierarchy_id: i64) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO label (hierarchy_id, label_value) VALUES (?1, ?2)",
        rusqlite::params![hierarchy_id, PLACEHOLDER_LABEL],
    )?;
    let id: i64 = conn.query_row(
        "SELECT label_id FROM label WHERE hierarchy_id = ?1 AND label_value = ?2",
        rusqlite::params![hierarchy_id, PLACEHOLDER_LABEL],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Add one or more new label columns. Each new name becomes a hierarchy
/// level at the next available rank. Colliding with an existing column is
/// a silent no-op for that name (idempotent add); duplicate *new* names in
/// the same call are rejected before anything is touched.
pub fn add_columns(conn: &Connection, names: &[String]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name.clone()) {
            return Err(NodeError::validation(format!(
                "duplicate new column name {name:?}"
            )));
        }
    }

    // A plain `SAVEPOINT` rather than `BEGIN TRANSACTION`: this function is
    // called both standalone and nested inside a caller's own explicit
    // transaction (e.g. ingestion's header reconciliation), and SQLite
    // rejects a `BEGIN` once a transaction is already open.
    drop_unique_indexes(conn)?;
    conn.execute_batch("SAVEPOINT add_columns")?;
    let result = match add_columns_inner(conn, names) {
        Ok(()) => {
            conn.execute_batch("RELEASE SAVEPOINT add_columns")?;
            Ok(())
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK TO SAVEPOINT add_columns; RELEASE SAVEPOINT add_columns")?;
            Err(e)
        }
    };
    recreate_unique_indexes(conn)?;
    result
}

fn add_columns_inner(conn: &Connection, names: &[String]) -> Result<()> {
    let existing = get_columns(conn)?;
    let next_rank: i64 = conn.query_row(
        "SELECT COALESCE(MAX(level_rank), -1) + 1 FROM hierarchy",
        [],
        |row| row.get(0),
    )?;
    let mut rank = next_rank;

    for raw_name in names {
        let name = normalize_identifier(raw_name);
        validate_identifier(&name)?;
        if existing.contains(&name) {
            debug!(column = %name, "add_columns: column already present, skipping");
            continue;
        }
        let quoted = quote_identifier(&name);

        conn.execute(
            "INSERT INTO hierarchy (level_name, level_rank) VALUES (?1, ?2)",
            rusqlite::params![name, rank],
        )?;
        let hierarchy_id = conn.last_insert_rowid();
        rank += 1;

        let placeholder_id = placeholder_label_id(conn, hierarchy_id)?;

        // SQLite refuses `ADD COLUMN` with both a `REFERENCES` clause and a
        // non-NULL default in one statement ("Cannot add a REFERENCES
        // column with non-NULL default value"), so the column is added
        // nullable and existing rows are backfilled separately.
        conn.execute(
            &format!("ALTER TABLE node_index ADD COLUMN {quoted} INTEGER REFERENCES label(label_id)"),
            [],
        )?;
        conn.execute(
            &format!("UPDATE node_index SET {quoted} = ?1 WHERE {quoted} IS NULL"),
            [placeholder_id],
        )?;
        conn.execute(
            &format!("ALTER TABLE location ADD COLUMN {quoted} TEXT NOT NULL DEFAULT ''"),
            [],
        )?;
        conn.execute(
            &format!(
                "ALTER TABLE structure ADD COLUMN {quoted} INTEGER NOT NULL \
                 CHECK ({quoted} IN (0, 1)) DEFAULT 0"
            ),
            [],
        )?;
        info!(column = %name, hierarchy_id, "added label column");
    }
    Ok(())
}

/// Rename label columns per `mapping` (old -> new), across all three
/// label-bearing tables and the `hierarchy.level_name` row, atomically.
pub fn update_columns(conn: &Connection, mapping: &HashMap<String, String>) -> Result<()> {
    if mapping.is_empty() {
        return Ok(());
    }
    let existing = get_columns(conn)?;
    let mut new_names = std::collections::HashSet::new();
    for (old, new) in mapping {
        if !existing.contains(old) {
            return Err(NodeError::not_found("label column", old));
        }
        let new = normalize_identifier(new);
        validate_identifier(&new)?;
        if !new_names.insert(new.clone()) {
            return Err(NodeError::conflict(format!(
                "duplicate rename target {new:?}"
            )));
        }
    }
    // Names that are not renamed but collide with a rename target also fail.
    for name in &existing {
        if !mapping.contains_key(name) && new_names.contains(name) {
            return Err(NodeError::conflict(format!(
                "rename target {name:?} collides with an existing column"
            )));
        }
    }

    drop_unique_indexes(conn)?;
    let result = if supports_native_rename(conn)? {
        conn.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<()> {
            for (old, new) in mapping {
                let new = normalize_identifier(new);
                let old_q = quote_identifier(old);
                let new_q = quote_identifier(&new);
                for table in LABEL_BEARING_TABLES {
                    conn.execute(
                        &format!("ALTER TABLE {table} RENAME COLUMN {old_q} TO {new_q}"),
                        [],
                    )?;
                }
                conn.execute(
                    "UPDATE hierarchy SET level_name = ?1 WHERE level_name = ?2",
                    rusqlite::params![new, old],
                )?;
            }
            Ok(())
        })();
        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT TRANSACTION")?;
                info!("renamed label columns (native path)");
                Ok(())
            }
            Err(e) => {
                conn.execute_batch("ROLLBACK TRANSACTION")?;
                Err(e)
            }
        }
    } else {
        let result = rebuild_with_column_mapping(conn, &existing, |name| {
            mapping.get(name).cloned().unwrap_or_else(|| name.to_string())
        });
        if result.is_ok() {
            for (old, new) in mapping {
                conn.execute(
                    "UPDATE hierarchy SET level_name = ?1 WHERE level_name = ?2",
                    rusqlite::params![normalize_identifier(new), old],
                )?;
            }
            info!("renamed label columns (rebuild path)");
        }
        result
    };
    recreate_unique_indexes(conn)?;
    result
}

/// Delete one or more label columns. Forbidden if it would remove every
/// label column, since weights, quantities, and edges rely on at least one
/// level of labelling.
pub fn delete_columns(conn: &Connection, names: &[String]) -> Result<()> {
    let existing = get_columns(conn)?;
    let to_delete: std::collections::HashSet<&str> = names.iter().map(|s| s.as_str()).collect();
    let retained: Vec<String> = existing
        .iter()
        .filter(|c| !to_delete.contains(c.as_str()))
        .cloned()
        .collect();
    if retained.is_empty() {
        return Err(NodeError::schema_state(
            "cannot delete all label columns: at least one level of labelling is required",
        ));
    }
    for name in names {
        if !existing.contains(name) {
            return Err(NodeError::not_found("label column", name));
        }
    }

    drop_unique_indexes(conn)?;
    let result = if supports_native_drop(conn)? {
        conn.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<()> {
            for name in names {
                let quoted = quote_identifier(name);
                for table in LABEL_BEARING_TABLES {
                    conn.execute(&format!("ALTER TABLE {table} DROP COLUMN {quoted}"), [])?;
                }
                conn.execute("DELETE FROM hierarchy WHERE level_name = ?1", [name])?;
            }
            Ok(())
        })();
        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT TRANSACTION")?;
                info!(?names, "deleted label columns (native path)");
                Ok(())
            }
            Err(e) => {
                conn.execute_batch("ROLLBACK TRANSACTION")?;
                Err(e)
            }
        }
    } else {
        let result = rebuild_with_retained_columns(conn, &retained);
        if result.is_ok() {
            for name in names {
                conn.execute("DELETE FROM hierarchy WHERE level_name = ?1", [name])?;
            }
            info!(?names, "deleted label columns (rebuild path)");
        }
        result
    };
    recreate_unique_indexes(conn)?;
    result
}

/// Legacy rebuild path used for rename when native `RENAME COLUMN` is
/// unavailable: build `new_*` tables with columns ordered and renamed per
/// `rename`, copy rows by positional projection, swap tables in, and run a
/// full foreign-key check before returning.
fn rebuild_with_column_mapping(
    conn: &Connection,
    existing: &[String],
    rename: impl Fn(&str) -> String,
) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = OFF", [])?;
    let result = (|| -> Result<()> {
        conn.execute_batch("BEGIN TRANSACTION")?;
        for table in LABEL_BEARING_TABLES {
            rebuild_table(conn, table, existing, &existing.iter().map(|c| rename(c)).collect::<Vec<_>>())?;
        }
        verify_foreign_key_check(conn)?;
        conn.execute_batch("COMMIT TRANSACTION")?;
        Ok(())
    })();
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    result
}

/// Legacy rebuild path used for delete when native `DROP COLUMN` is
/// unavailable.
fn rebuild_with_retained_columns(conn: &Connection, retained: &[String]) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = OFF", [])?;
    let result = (|| -> Result<()> {
        conn.execute_batch("BEGIN TRANSACTION")?;
        for table in LABEL_BEARING_TABLES {
            rebuild_table(conn, table, retained, retained)?;
        }
        verify_foreign_key_check(conn)?;
        conn.execute_batch("COMMIT TRANSACTION")?;
        Ok(())
    })();
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    result
}

/// Rebuild one label-bearing table keeping `source_columns` (selected from
/// the existing table, in order) and writing them out named per
/// `target_columns` (same length, same order).
fn rebuild_table(
    conn: &Connection,
    table: &str,
    source_columns: &[String],
    target_columns: &[String],
) -> Result<()> {
    let (reserved, column_def): (&[&str], &dyn Fn(&str) -> String) = match table {
        "node_index" => (
            NODE_INDEX_RESERVED,
            &|c: &str| format!("{} INTEGER NOT NULL REFERENCES label(label_id)", quote_identifier(c)),
        ),
        "location" => (
            LOCATION_RESERVED,
            &|c: &str| format!("{} TEXT NOT NULL DEFAULT ''", quote_identifier(c)),
        ),
        "structure" => (
            STRUCTURE_RESERVED,
            &|c: &str| {
                let q = quote_identifier(c);
                format!("{q} INTEGER NOT NULL CHECK ({q} IN (0, 1)) DEFAULT 0")
            },
        ),
        _ => unreachable!("rebuild_table called with unexpected table {table}"),
    };

    let new_table = format!("new_{table}");
    let reserved_defs: Vec<String> = reserved
        .iter()
        .map(|c| reserved_column_definition(table, c))
        .collect();
    let label_defs: Vec<String> = target_columns.iter().map(|c| column_def(c)).collect();
    let all_defs = reserved_defs
        .iter()
        .cloned()
        .chain(label_defs)
        .collect::<Vec<_>>()
        .join(",\n    ");
    conn.execute(&format!("CREATE TABLE {new_table} (\n    {all_defs}\n)"), [])?;

    let reserved_select = reserved.join(", ");
    let source_select = source_columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let select_list = if source_columns.is_empty() {
        reserved_select.clone()
    } else {
        format!("{reserved_select}, {source_select}")
    };
    conn.execute(
        &format!("INSERT INTO {new_table} SELECT {select_list} FROM {table}"),
        [],
    )?;
    conn.execute(&format!("DROP TABLE {table}"), [])?;
    conn.execute(&format!("ALTER TABLE {new_table} RENAME TO {table}"), [])?;
    Ok(())
}

fn reserved_column_definition(table: &str, column: &str) -> String {
    match (table, column) {
        ("node_index", "index_id") => "index_id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        ("node_index", "partial") => {
            "partial INTEGER NOT NULL DEFAULT 0 CHECK (partial IN (0, 1))".to_string()
        }
        ("location", "_location_id") => "_location_id INTEGER PRIMARY KEY".to_string(),
        ("structure", "_structure_id") => "_structure_id INTEGER PRIMARY KEY".to_string(),
        ("structure", "_granularity") => "_granularity REAL".to_string(),
        _ => unreachable!("unexpected reserved column {column} on {table}"),
    }
}
