//! Open-time tunables for a node's backing connection.

/// PRAGMA and connection tuning applied when a node is opened or created.
///
/// The defaults match a single-writer embedded workload: WAL journaling,
/// foreign keys always enforced outside of column rebuilds, and a modest
/// page cache. Callers needing different tuning (e.g. an in-memory node
/// used only for a short-lived test) can override individual fields.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub journal_mode: JournalMode,
    pub synchronous: Synchronous,
    /// SQLite cache size in pages (negative means kibibytes, per PRAGMA
    /// cache_size semantics).
    pub cache_size: i64,
    pub temp_store: TempStore,
    /// Milliseconds SQLite will retry on SQLITE_BUSY before giving up.
    pub busy_timeout_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            journal_mode: JournalMode::Wal,
            synchronous: Synchronous::Normal,
            cache_size: -2000,
            temp_store: TempStore::Memory,
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    Wal,
    Delete,
    Memory,
}

impl JournalMode {
    pub fn as_pragma_value(self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Memory => "MEMORY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synchronous {
    Off,
    Normal,
    Full,
}

impl Synchronous {
    pub fn as_pragma_value(self) -> &'static str {
        match self {
            Synchronous::Off => "OFF",
            Synchronous::Normal => "NORMAL",
            Synchronous::Full => "FULL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempStore {
    Default,
    File,
    Memory,
}

impl TempStore {
    pub fn as_pragma_value(self) -> &'static str {
        match self {
            TempStore::Default => "DEFAULT",
            TempStore::File => "FILE",
            TempStore::Memory => "MEMORY",
        }
    }
}
