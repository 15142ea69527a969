//! DDL for a node file.
//!
//! The three label-bearing tables (`node_index`, `location`, `structure`)
//! are created here with their surrogate key and fixed columns only; their
//! per-hierarchy-level columns are added, renamed, and dropped at runtime
//! by the schema manager (see `crate::schema::column_manager`), one column
//! per hierarchy level, kept in lock-step across all three tables.

/// Schema version recorded in the `property` table and checked on open.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Application-defined identifier written to `PRAGMA application_id`,
/// checked on open as the "magic value" identifying a node file.
pub const APPLICATION_ID: i32 = 0x47504e31; // "GPN1"

/// Distinguished label value denoting "no mapping at this level".
pub const UNMAPPED: &str = "UNMAPPED";

/// Placeholder value used to backfill a label column on rows that existed
/// before the column was added.
pub const PLACEHOLDER_LABEL: &str = "-";

pub const SCHEMA_CREATE_HIERARCHY: &str = r#"
CREATE TABLE IF NOT EXISTS hierarchy (
    hierarchy_id INTEGER PRIMARY KEY AUTOINCREMENT,
    level_name TEXT NOT NULL UNIQUE,
    level_rank INTEGER NOT NULL UNIQUE
)
"#;

pub const SCHEMA_CREATE_LABEL: &str = r#"
CREATE TABLE IF NOT EXISTS label (
    label_id INTEGER PRIMARY KEY AUTOINCREMENT,
    hierarchy_id INTEGER NOT NULL REFERENCES hierarchy(hierarchy_id) ON DELETE CASCADE,
    label_value TEXT NOT NULL,
    UNIQUE (hierarchy_id, label_value)
)
"#;

/// `node_index` starts with only its surrogate key and the `partial` flag;
/// per-level columns are added by the schema manager, which also maintains
/// a composite `UNIQUE` index over them (see
/// `crate::schema::column_manager::NODE_INDEX_UNIQUE_INDEX`) to enforce C1.
pub const SCHEMA_CREATE_NODE_INDEX: &str = r#"
CREATE TABLE IF NOT EXISTS node_index (
    index_id INTEGER PRIMARY KEY AUTOINCREMENT,
    partial INTEGER NOT NULL DEFAULT 0 CHECK (partial IN (0, 1))
)
"#;

pub const SCHEMA_CREATE_LOCATION: &str = r#"
CREATE TABLE IF NOT EXISTS location (
    _location_id INTEGER PRIMARY KEY AUTOINCREMENT
)
"#;

pub const SCHEMA_CREATE_STRUCTURE: &str = r#"
CREATE TABLE IF NOT EXISTS structure (
    _structure_id INTEGER PRIMARY KEY AUTOINCREMENT,
    _granularity REAL
)
"#;

pub const SCHEMA_CREATE_WEIGHTING: &str = r#"
CREATE TABLE IF NOT EXISTS weighting (
    weighting_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    selectors TEXT,
    is_complete INTEGER NOT NULL CHECK (is_complete IN (0, 1)) DEFAULT 0
)
"#;

pub const SCHEMA_CREATE_WEIGHT: &str = r#"
CREATE TABLE IF NOT EXISTS weight (
    weight_id INTEGER PRIMARY KEY AUTOINCREMENT,
    weighting_id INTEGER NOT NULL,
    index_id INTEGER,
    weight_value REAL NOT NULL,
    FOREIGN KEY (weighting_id) REFERENCES weighting(weighting_id) ON DELETE CASCADE,
    FOREIGN KEY (index_id) REFERENCES node_index(index_id) DEFERRABLE INITIALLY DEFERRED,
    UNIQUE (index_id, weighting_id)
)
"#;

pub const SCHEMA_CREATE_ATTRIBUTE: &str = r#"
CREATE TABLE IF NOT EXISTS attribute (
    attribute_id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute_value TEXT NOT NULL UNIQUE
)
"#;

pub const SCHEMA_CREATE_QUANTITY: &str = r#"
CREATE TABLE IF NOT EXISTS quantity (
    quantity_id INTEGER PRIMARY KEY AUTOINCREMENT,
    _location_id INTEGER,
    attribute_id INTEGER,
    quantity_value NUMERIC NOT NULL,
    FOREIGN KEY (_location_id) REFERENCES location(_location_id),
    FOREIGN KEY (attribute_id) REFERENCES attribute(attribute_id) ON DELETE CASCADE
)
"#;

pub const SCHEMA_CREATE_EDGE: &str = r#"
CREATE TABLE IF NOT EXISTS edge (
    edge_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    selectors TEXT,
    user_properties TEXT,
    other_unique_id TEXT NOT NULL,
    other_filename_hint TEXT,
    other_index_hash TEXT,
    is_locally_complete INTEGER NOT NULL CHECK (is_locally_complete IN (0, 1)) DEFAULT 0,
    is_default INTEGER CHECK (is_default IS NULL OR is_default = 1) DEFAULT NULL,
    UNIQUE (name, other_unique_id),
    UNIQUE (is_default, other_unique_id)
)
"#;

pub const SCHEMA_CREATE_RELATION: &str = r#"
CREATE TABLE IF NOT EXISTS relation (
    relation_id INTEGER PRIMARY KEY AUTOINCREMENT,
    edge_id INTEGER,
    other_index_id INTEGER NOT NULL,
    index_id INTEGER,
    relation_value REAL NOT NULL CHECK (0.0 <= relation_value),
    proportion REAL CHECK (proportion IS NULL OR (0.0 <= proportion AND proportion <= 1.0)),
    mapping_level BLOB,
    FOREIGN KEY (edge_id) REFERENCES edge(edge_id) ON DELETE CASCADE,
    FOREIGN KEY (index_id) REFERENCES node_index(index_id) DEFERRABLE INITIALLY DEFERRED,
    UNIQUE (edge_id, other_index_id, index_id)
)
"#;

pub const SCHEMA_CREATE_PROPERTY: &str = r#"
CREATE TABLE IF NOT EXISTS property (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT
)
"#;

/// Reserved `property` keys.
pub const PROPERTY_KEY_UNIQUE_ID: &str = "unique_id";
pub const PROPERTY_KEY_SCHEMA_VERSION: &str = "toron_schema_version";
pub const PROPERTY_KEY_APP_VERSION: &str = "toron_app_version";
pub const PROPERTY_KEY_CONTENT_HASH: &str = "content_hash";

/// All statements required to create a brand-new, empty node file, in
/// dependency order. Run inside one transaction; the reserved cell 0 and
/// the mandatory property rows are inserted immediately after.
pub const SCHEMA_CREATE_ALL: &[&str] = &[
    SCHEMA_CREATE_HIERARCHY,
    SCHEMA_CREATE_LABEL,
    SCHEMA_CREATE_NODE_INDEX,
    SCHEMA_CREATE_LOCATION,
    SCHEMA_CREATE_STRUCTURE,
    SCHEMA_CREATE_WEIGHTING,
    SCHEMA_CREATE_WEIGHT,
    SCHEMA_CREATE_ATTRIBUTE,
    SCHEMA_CREATE_QUANTITY,
    SCHEMA_CREATE_EDGE,
    SCHEMA_CREATE_RELATION,
    SCHEMA_CREATE_PROPERTY,
];

/// Tables whose presence is required for a file to be considered a node
/// (used by the open-time validation pass).
pub const REQUIRED_TABLES: &[&str] = &[
    "hierarchy",
    "label",
    "node_index",
    "location",
    "structure",
    "weighting",
    "weight",
    "attribute",
    "quantity",
    "edge",
    "relation",
    "property",
];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn creates_all_required_tables() {
        let conn = Connection::open_in_memory().unwrap();
        for stmt in SCHEMA_CREATE_ALL {
            conn.execute(stmt, []).unwrap();
        }
        let mut names: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        names.sort();
        for table in REQUIRED_TABLES {
            assert!(names.iter().any(|n| n == table), "missing table {table}");
        }
    }
}
