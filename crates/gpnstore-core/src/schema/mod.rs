//! Schema Manager: adds, renames, and drops label columns across the
//! three label-bearing tables in lock-step.

pub mod column_manager;

pub use column_manager::{
    add_columns, delete_columns, drop_unique_indexes, get_columns, recreate_unique_indexes,
    update_columns, NODE_INDEX_UNIQUE_INDEX, STRUCTURE_UNIQUE_INDEX,
};
