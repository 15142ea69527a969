//! `gpnstore-core`: a local storage engine for granular partition networks.
//!
//! A *node* is one partition-network dataset stored as a single SQLite
//! file. This crate owns the relational schema, the constraint engine that
//! keeps it internally consistent, typed repositories over every entity in
//! that schema, and the bulk ingestion/fingerprinting/mapping-resolution
//! logic layered over them. [`Node`] is the facade most callers want; the
//! `repository` module is there for callers who need finer-grained access
//! to a single entity kind.

pub mod bitflag;
pub mod config;
pub mod constraints;
pub mod edge_descriptor;
pub mod error;
pub mod identifier;
pub mod ingestion;
pub mod kernel;
pub mod repository;
pub mod schema;

use std::path::Path;

use kernel::schema_sql::{PROPERTY_KEY_SCHEMA_VERSION, PROPERTY_KEY_UNIQUE_ID};
use kernel::{OpenMode, Session};

pub use error::{NodeError, Result};

/// A single partition-network dataset: a thin facade over a [`Session`]
/// that wires together the repository layer and the ingestion pipeline for
/// the common case of "open a node, do one or two things, close it".
///
/// Callers who need concurrent access to several repositories at once, or
/// who are building their own higher-level command on top of the core,
/// can reach `node.session()` and use the `repository`/`ingestion` modules
/// directly; `Node` does not hide them.
pub struct Node {
    session: Session,
}

impl Node {
    /// Create a new node file at `path`. Fails if the file already exists.
    pub fn create(path: impl AsRef<Path>, config: &config::NodeConfig) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(NodeError::conflict(format!(
                "a file already exists at {}",
                path.display()
            )));
        }
        Ok(Node {
            session: Session::open(path, OpenMode::ReadWriteCreate, config)?,
        })
    }

    /// Open an existing node file read-write.
    pub fn open(path: impl AsRef<Path>, config: &config::NodeConfig) -> Result<Self> {
        Ok(Node {
            session: Session::open(path, OpenMode::ReadWrite, config)?,
        })
    }

    /// Open an existing node file read-only.
    pub fn open_read_only(path: impl AsRef<Path>, config: &config::NodeConfig) -> Result<Self> {
        Ok(Node {
            session: Session::open(path, OpenMode::ReadOnly, config)?,
        })
    }

    /// A private, in-memory node, useful for tests and scratch work.
    pub fn in_memory(config: &config::NodeConfig) -> Result<Self> {
        Ok(Node {
            session: Session::open("", OpenMode::InMemory, config)?,
        })
    }

    /// The underlying session, for callers that need repository-level
    /// access this facade doesn't cover.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn path(&self) -> Option<&Path> {
        self.session.path()
    }

    pub fn is_read_only(&self) -> bool {
        self.session.is_read_only()
    }

    /// The node's UUID, assigned once at creation.
    pub fn unique_id(&self) -> Result<String> {
        repository::property::PropertyRepository::get(self.session.connection(), PROPERTY_KEY_UNIQUE_ID)?
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| NodeError::storage_integrity("missing unique_id property"))
    }

    /// The schema version this node file was created under.
    pub fn schema_version(&self) -> Result<String> {
        repository::property::PropertyRepository::get(self.session.connection(), PROPERTY_KEY_SCHEMA_VERSION)?
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| NodeError::storage_integrity("missing toron_schema_version property"))
    }

    /// The node's hierarchy level names, in rank order (root first).
    pub fn hierarchy_names(&self) -> Result<Vec<String>> {
        Ok(repository::hierarchy::HierarchyRepository::list(self.session.connection())?
            .into_iter()
            .map(|level| level.level_name)
            .collect())
    }

    /// Total cell count, including the reserved undefined cell and the
    /// `UNMAPPED` sentinel if present.
    pub fn cell_count(&self) -> Result<i64> {
        repository::cell::CellRepository::count(self.session.connection())
    }

    /// The node's current content-hash fingerprint, or `None` if it has
    /// never been ingested into.
    pub fn content_hash(&self) -> Result<Option<String>> {
        repository::property::PropertyRepository::get_content_hash(self.session.connection())
    }

    /// Bulk-insert cells from `rows`. See [`ingestion::insert_cells`].
    pub fn insert_cells(&self, rows: &mut dyn ingestion::RowIterator) -> Result<ingestion::IngestSummary> {
        ingestion::insert_cells(&self.session, rows)
    }

    /// Export every cell to `sink`. See [`ingestion::export_cells`].
    pub fn export_cells(&self, sink: &mut dyn ingestion::RowSink) -> Result<()> {
        ingestion::export_cells(&self.session, sink)
    }
}
