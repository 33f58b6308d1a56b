//! Page domain model.
//!
//! # Responsibility
//! - Define the canonical record for notebook documents and folders.
//! - Define the metadata patch applied by `update_page_meta`.
//!
//! # Invariants
//! - `id` is assigned once at creation and never changes.
//! - `parent_id = None` means root-level page.
//! - `order` is the sibling position inside one `parent_id` group.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Title given to new documents when the caller supplies none.
pub const DEFAULT_PAGE_TITLE: &str = "Untitled Page";
/// Title given to new folders when the caller supplies none.
pub const DEFAULT_FOLDER_TITLE: &str = "New Folder";

/// Opaque page identifier.
///
/// Fresh ids are time-ordered UUIDv7 strings. Ids read back from storage are
/// accepted verbatim, so older snapshots with short numeric ids still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Generates a new unique id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of one to-do item inside a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    /// Generates a new unique id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for TodoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TodoId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// To-do entry scoped to one page. Opaque to tree invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: TodoId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// Notebook page: either a document or a folder.
///
/// Serialized in camelCase so the persisted snapshot keeps the field names
/// used by the browser client (`parentId`, `isFolder`, `coverImage`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Stable page id.
    pub id: PageId,
    /// User-facing label.
    pub title: String,
    /// Rich-text payload owned by the editor.
    #[serde(default)]
    pub content: String,
    /// Containing page. `None` means root-level page.
    #[serde(default)]
    pub parent_id: Option<PageId>,
    /// Sibling position within one parent.
    #[serde(default)]
    pub order: i64,
    /// Folders accept `Inside` drops; documents only `Before`/`After`.
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Page {
    /// Creates an empty document page with a generated id.
    pub fn new_document(parent_id: Option<PageId>, order: i64, title: impl Into<String>) -> Self {
        Self::with_id(PageId::generate(), parent_id, order, false, title)
    }

    /// Creates an empty folder page with a generated id.
    pub fn new_folder(parent_id: Option<PageId>, order: i64, title: impl Into<String>) -> Self {
        Self::with_id(PageId::generate(), parent_id, order, true, title)
    }

    /// Creates an empty page with a caller-provided id.
    ///
    /// Used by import paths and tests where identity already exists.
    pub fn with_id(
        id: PageId,
        parent_id: Option<PageId>,
        order: i64,
        is_folder: bool,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            content: String::new(),
            parent_id,
            order,
            is_folder,
            todos: Vec::new(),
            icon: None,
            cover_image: None,
            tags: Vec::new(),
        }
    }

    /// Returns the default title for the page kind.
    pub fn default_title(is_folder: bool) -> &'static str {
        if is_folder {
            DEFAULT_FOLDER_TITLE
        } else {
            DEFAULT_PAGE_TITLE
        }
    }
}

/// Shallow metadata patch for one page.
///
/// `None` leaves a field untouched. For `icon` and `cover_image`,
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetaPatch {
    pub title: Option<String>,
    pub icon: Option<Option<String>>,
    pub cover_image: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

impl PageMetaPatch {
    /// Returns whether the patch carries no field at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.icon.is_none()
            && self.cover_image.is_none()
            && self.tags.is_none()
    }

    /// Merges the patch into `page`.
    ///
    /// Returns `true` when at least one field value changed.
    pub fn apply(&self, page: &mut Page) -> bool {
        let mut changed = false;
        if let Some(title) = &self.title {
            changed |= replace_if_different(&mut page.title, title.clone());
        }
        if let Some(icon) = &self.icon {
            changed |= replace_if_different(&mut page.icon, icon.clone());
        }
        if let Some(cover_image) = &self.cover_image {
            changed |= replace_if_different(&mut page.cover_image, cover_image.clone());
        }
        if let Some(tags) = &self.tags {
            changed |= replace_if_different(&mut page.tags, tags.clone());
        }
        changed
    }
}

fn replace_if_different<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
