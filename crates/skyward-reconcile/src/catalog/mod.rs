//! Per-resource-type tables
//!
//! Expected states, identifier shapes and compound workflows are declared
//! here as data. Supporting a new resource means adding entries, not
//! writing a new wait loop.

pub mod ids;
pub mod states;
pub mod workflows;
