//! Core domain logic for the brainnote notebook.
//! This crate is the single source of truth for page-tree invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::drop::{resolve_drop_position, DropPosition, HoverExpandTracker};
pub use model::page::{Page, PageId, PageMetaPatch, TodoId, TodoItem};
pub use repo::page_repo::{
    page_storage_key, MemoryPageRepository, PageRepoError, PageRepoResult, PageRepository,
    SqlitePageRepository,
};
pub use service::page_store::{
    MoveOutcome, MoveRejection, PageStore, PageStoreError, StoreEvent, SubscriptionId,
};
pub use service::tag_index::build_tag_index;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
