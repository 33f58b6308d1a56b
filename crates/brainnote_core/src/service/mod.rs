//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate tree algorithms and repository calls into store operations.
//! - Keep renderers decoupled from storage details.

pub mod page_store;
pub mod tag_index;
pub mod tree_ops;
