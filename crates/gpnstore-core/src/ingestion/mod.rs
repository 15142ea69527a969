//! Ingestion & Fingerprinting: bulk cell loading, content-hash computation,
//! and mapping-level resolution for edges.

pub mod cells;
pub mod fingerprint;
pub mod grouped;
pub mod mapping;

pub use cells::{export_cells, insert_cells, IngestSummary, RowIterator, RowSink, VecRowIterator, VecRowSink};
pub use fingerprint::compute_content_hash;
pub use grouped::{match_grouped, GroupOutcome};
pub use mapping::{resolve_row, resolve_structure, row_bit_flags};
