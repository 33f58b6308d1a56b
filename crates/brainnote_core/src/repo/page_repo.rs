//! Page snapshot repository contracts and implementations.
//!
//! # Responsibility
//! - Load and save the full page collection of one user as a single blob.
//! - Keep SQL and JSON encoding details inside the repository boundary.
//!
//! # Invariants
//! - Snapshots are keyed by a per-user storage key; users never share rows.
//! - `save_pages` replaces the whole snapshot; there are no partial writes.
//! - Undecodable payloads surface as `InvalidData`, never as an empty tree.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::page::Page;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Prefix shared by every page snapshot storage key.
pub const STORAGE_KEY_PREFIX: &str = "pages";
/// User scope used when no signed-in identity is available.
pub const GUEST_USER: &str = "guest";

/// Result type used by page repository operations.
pub type PageRepoResult<T> = Result<T, PageRepoError>;

/// Errors from page snapshot persistence.
#[derive(Debug)]
pub enum PageRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Page collection could not be encoded.
    Serialize(serde_json::Error),
    /// Persisted payload cannot be decoded into pages.
    InvalidData(String),
    /// Storage key is blank after trim.
    InvalidStorageKey,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Backend refused the write.
    WriteRejected(String),
}

impl Display for PageRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialize(err) => write!(f, "failed to encode page snapshot: {err}"),
            Self::InvalidData(message) => write!(f, "invalid page snapshot: {message}"),
            Self::InvalidStorageKey => write!(f, "storage key must not be blank"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "page repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "page repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "page repository requires column `{column}` in table `{table}`"
            ),
            Self::WriteRejected(message) => write!(f, "page snapshot write rejected: {message}"),
        }
    }
}

impl Error for PageRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialize(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for PageRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PageRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Builds the namespaced storage key for one user.
///
/// A missing or blank user id maps to the shared guest scope.
pub fn page_storage_key(user_id: Option<&str>) -> String {
    let user = user_id
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(GUEST_USER);
    format!("{STORAGE_KEY_PREFIX}:{user}")
}

/// Persistence adapter consumed by the page store.
pub trait PageRepository {
    /// Loads the snapshot saved under `user_key`.
    ///
    /// Returns `Ok(None)` when nothing was saved yet.
    fn load_pages(&self, user_key: &str) -> PageRepoResult<Option<Vec<Page>>>;
    /// Replaces the snapshot saved under `user_key`.
    fn save_pages(&self, user_key: &str, pages: &[Page]) -> PageRepoResult<()>;
}

impl<R: PageRepository + ?Sized> PageRepository for &R {
    fn load_pages(&self, user_key: &str) -> PageRepoResult<Option<Vec<Page>>> {
        (**self).load_pages(user_key)
    }

    fn save_pages(&self, user_key: &str, pages: &[Page]) -> PageRepoResult<()> {
        (**self).save_pages(user_key, pages)
    }
}

/// SQLite-backed snapshot repository.
pub struct SqlitePageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePageRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> PageRepoResult<Self> {
        ensure_snapshot_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PageRepository for SqlitePageRepository<'_> {
    fn load_pages(&self, user_key: &str) -> PageRepoResult<Option<Vec<Page>>> {
        let user_key = normalize_storage_key(user_key)?;
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload
                 FROM page_snapshots
                 WHERE user_key = ?1;",
                [user_key],
                |row| row.get(0),
            )
            .optional()?;

        payload.map(|value| decode_snapshot(&value)).transpose()
    }

    fn save_pages(&self, user_key: &str, pages: &[Page]) -> PageRepoResult<()> {
        let user_key = normalize_storage_key(user_key)?;
        let payload = encode_snapshot(pages)?;
        self.conn.execute(
            "INSERT INTO page_snapshots (user_key, payload, page_count, updated_at)
             VALUES (?1, ?2, ?3, (strftime('%s', 'now') * 1000))
             ON CONFLICT(user_key) DO UPDATE SET
                payload = excluded.payload,
                page_count = excluded.page_count,
                updated_at = excluded.updated_at;",
            params![user_key, payload, pages.len() as i64],
        )?;
        Ok(())
    }
}

/// In-memory snapshot repository for tests and ephemeral sessions.
///
/// Payloads are kept JSON-encoded so reads go through the same decoding path
/// as the SQLite repository.
#[derive(Default)]
pub struct MemoryPageRepository {
    snapshots: RefCell<HashMap<String, String>>,
    simulate_write_error: Cell<bool>,
    save_count: Cell<usize>,
}

impl MemoryPageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    /// Number of successful saves since creation.
    pub fn save_count(&self) -> usize {
        self.save_count.get()
    }

    /// Stores a raw payload, bypassing encoding. Test helper for corrupt data.
    pub fn insert_raw(&self, user_key: &str, payload: impl Into<String>) {
        self.snapshots
            .borrow_mut()
            .insert(user_key.to_string(), payload.into());
    }
}

impl PageRepository for MemoryPageRepository {
    fn load_pages(&self, user_key: &str) -> PageRepoResult<Option<Vec<Page>>> {
        let user_key = normalize_storage_key(user_key)?;
        self.snapshots
            .borrow()
            .get(user_key)
            .map(|payload| decode_snapshot(payload))
            .transpose()
    }

    fn save_pages(&self, user_key: &str, pages: &[Page]) -> PageRepoResult<()> {
        let user_key = normalize_storage_key(user_key)?;
        if self.simulate_write_error.get() {
            return Err(PageRepoError::WriteRejected(
                "simulated write error".to_string(),
            ));
        }
        let payload = encode_snapshot(pages)?;
        self.snapshots
            .borrow_mut()
            .insert(user_key.to_string(), payload);
        self.save_count.set(self.save_count.get() + 1);
        Ok(())
    }
}

fn normalize_storage_key(user_key: &str) -> PageRepoResult<&str> {
    let trimmed = user_key.trim();
    if trimmed.is_empty() {
        return Err(PageRepoError::InvalidStorageKey);
    }
    Ok(trimmed)
}

fn encode_snapshot(pages: &[Page]) -> PageRepoResult<String> {
    serde_json::to_string(pages).map_err(PageRepoError::Serialize)
}

fn decode_snapshot(payload: &str) -> PageRepoResult<Vec<Page>> {
    serde_json::from_str(payload).map_err(|err| PageRepoError::InvalidData(err.to_string()))
}

fn ensure_snapshot_connection_ready(conn: &Connection) -> PageRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(PageRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "page_snapshots")? {
        return Err(PageRepoError::MissingRequiredTable("page_snapshots"));
    }

    for column in ["user_key", "payload", "page_count", "updated_at"] {
        if !table_has_column(conn, "page_snapshots", column)? {
            return Err(PageRepoError::MissingRequiredColumn {
                table: "page_snapshots",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> PageRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> PageRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
