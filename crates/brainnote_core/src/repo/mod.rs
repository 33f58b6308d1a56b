//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the load/save contract the page store persists through.
//! - Isolate SQLite and JSON encoding details from tree orchestration.
//!
//! # Invariants
//! - Repositories store whole snapshots; they never enforce tree invariants.
//! - Repository APIs return semantic errors (`InvalidData`) in addition to DB
//!   transport errors.

pub mod page_repo;
