//! Domain model for the notebook page tree.
//!
//! # Responsibility
//! - Define canonical page records used by the tree store.
//! - Define the drop-placement vocabulary shared with renderers.
//!
//! # Invariants
//! - Every page is identified by a stable `PageId`.
//! - Deletion is a hard removal of the whole subtree.

pub mod drop;
pub mod page;
