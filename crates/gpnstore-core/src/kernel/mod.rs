//! Storage Kernel: node file lifecycle, sessions, transactions, savepoints.

pub mod schema_sql;
pub mod session;

pub use session::{OpenMode, Savepoint, Session};
