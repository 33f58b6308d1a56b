//! Page tree store.
//!
//! # Responsibility
//! - Own the canonical page collection and the active page pointer of one user.
//! - Provide the only mutation paths (add, delete, rename, move, meta/content
//!   and to-do updates), each enforcing tree invariants.
//! - Persist after every committed mutation and notify subscribers.
//!
//! # Invariants
//! - Every `parent_id` references an existing page.
//! - The parent graph is acyclic.
//! - Every sibling group is ordered `0..n-1` after each mutation.
//! - The active page exists whenever the collection is non-empty.
//! - Unknown ids and rejected moves are no-ops: nothing is saved or notified.

use crate::model::drop::DropPosition;
use crate::model::page::{Page, PageId, PageMetaPatch, TodoId, TodoItem};
use crate::repo::page_repo::{PageRepoError, PageRepository};
use crate::service::tag_index::build_tag_index;
use crate::service::tree_ops::{
    ancestors, collect_subtree, find_index, is_ancestor_or_self, normalize_orders, place_page,
    repair_loaded, sorted_siblings,
};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from page store operations.
#[derive(Debug)]
pub enum PageStoreError {
    /// `add` referenced a parent that does not exist.
    InvalidParent(PageId),
    /// Explicit flush failed.
    Repo(PageRepoError),
}

impl Display for PageStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidParent(id) => write!(f, "parent page not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PageStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::InvalidParent(_) => None,
        }
    }
}

impl From<PageRepoError> for PageStoreError {
    fn from(value: PageRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Reason a move was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveRejection {
    /// Dragged page dropped onto itself.
    SameTarget,
    /// Dragged or target page does not exist.
    NotFound(PageId),
    /// Target is the dragged page's descendant.
    Cycle,
    /// `Inside` drop onto a document.
    TargetNotFolder,
}

/// Result of `move_page`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Placement changed and was committed.
    Moved,
    /// Placement resolved to the current layout; nothing was committed.
    Unchanged,
    /// Move refused; collection untouched.
    Rejected(MoveRejection),
}

/// Change notification delivered to subscribers after commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added { id: PageId },
    Deleted { ids: Vec<PageId> },
    Renamed { id: PageId },
    Moved { id: PageId },
    MetaUpdated { id: PageId },
    ContentUpdated { id: PageId },
    TodosUpdated { id: PageId },
    ActiveChanged { id: Option<PageId> },
}

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&StoreEvent)>;

/// Page tree store bound to one user scope.
pub struct PageStore<R: PageRepository> {
    repo: R,
    user_key: String,
    pages: Vec<Page>,
    active: Option<PageId>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl<R: PageRepository> PageStore<R> {
    /// Opens the store for `user_key`, loading its saved snapshot.
    ///
    /// A missing snapshot yields an empty tree. A failed load is logged and
    /// also yields an empty tree. Loaded pages are repaired so that every
    /// invariant holds before the first mutation.
    pub fn open(repo: R, user_key: impl Into<String>) -> Self {
        let user_key = user_key.into();
        let loaded = match repo.load_pages(&user_key) {
            Ok(Some(pages)) => pages,
            Ok(None) => {
                info!("event=pages_load module=store status=empty user_key={user_key}");
                Vec::new()
            }
            Err(err) => {
                error!(
                    "event=pages_load module=store status=error user_key={user_key} error={err}"
                );
                Vec::new()
            }
        };

        let (pages, report) = repair_loaded(loaded);
        if !report.is_clean() {
            warn!(
                "event=pages_repair module=store status=ok user_key={} duplicates_dropped={} reparented={} reordered={}",
                user_key, report.duplicates_dropped, report.reparented, report.reordered
            );
        }

        let mut store = Self {
            repo,
            user_key,
            pages,
            active: None,
            listeners: Vec::new(),
            next_subscription: 0,
        };
        store.active = store.fallback_active();
        info!(
            "event=pages_load module=store status=ok user_key={} page_count={}",
            store.user_key,
            store.pages.len()
        );
        store
    }

    /// Saves a final snapshot and releases subscribers.
    pub fn dispose(self) {
        self.persist();
        info!(
            "event=store_dispose module=store status=ok user_key={} page_count={}",
            self.user_key,
            self.pages.len()
        );
    }

    /// Saves the current snapshot and reports failure to the caller.
    pub fn flush(&self) -> Result<(), PageStoreError> {
        self.repo.save_pages(&self.user_key, &self.pages)?;
        Ok(())
    }

    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// All pages in collection order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, id: &PageId) -> Option<&Page> {
        self.pages.iter().find(|page| &page.id == id)
    }

    pub fn active_page_id(&self) -> Option<&PageId> {
        self.active.as_ref()
    }

    pub fn active_page(&self) -> Option<&Page> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    /// Children of `parent_id` (root level for `None`), sorted by order.
    pub fn children(&self, parent_id: Option<&PageId>) -> Vec<&Page> {
        sorted_siblings(&self.pages, parent_id)
    }

    /// Path from the root page down to `id`, inclusive.
    ///
    /// Empty when `id` does not exist.
    pub fn breadcrumb(&self, id: &PageId) -> Vec<&Page> {
        let Some(page) = self.get(id) else {
            return Vec::new();
        };
        let mut path: Vec<&Page> = ancestors(&self.pages, id)
            .iter()
            .filter_map(|ancestor| self.get(ancestor))
            .collect();
        path.push(page);
        path
    }

    /// Tag name to number of pages carrying it.
    pub fn tag_index(&self) -> BTreeMap<String, usize> {
        build_tag_index(&self.pages)
    }

    /// Registers a listener called after every committed change.
    pub fn subscribe(&mut self, listener: impl FnMut(&StoreEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` when it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(current, _)| *current != id);
        self.listeners.len() != before
    }

    /// Creates an empty document or folder as the last child of `parent_id`.
    ///
    /// The new page becomes active. A missing or blank title falls back to
    /// the default title for the kind.
    ///
    /// # Errors
    /// - `InvalidParent` when `parent_id` does not exist; nothing is created.
    pub fn add(
        &mut self,
        parent_id: Option<&PageId>,
        is_folder: bool,
        title: Option<&str>,
    ) -> Result<Page, PageStoreError> {
        if let Some(parent_id) = parent_id {
            if find_index(&self.pages, parent_id).is_none() {
                debug!("event=page_add module=store status=skip reason=invalid_parent parent_id={parent_id}");
                return Err(PageStoreError::InvalidParent(parent_id.clone()));
            }
        }

        let order = self
            .pages
            .iter()
            .filter(|page| page.parent_id.as_ref() == parent_id)
            .count() as i64;
        let title = title
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(Page::default_title(is_folder));
        let page = Page::with_id(
            PageId::generate(),
            parent_id.cloned(),
            order,
            is_folder,
            title,
        );

        self.pages.push(page.clone());
        self.active = Some(page.id.clone());
        info!(
            "event=page_add module=store status=ok page_id={} is_folder={} order={}",
            page.id, page.is_folder, page.order
        );
        self.commit(vec![
            StoreEvent::Added {
                id: page.id.clone(),
            },
            StoreEvent::ActiveChanged {
                id: Some(page.id.clone()),
            },
        ]);
        Ok(page)
    }

    /// Deletes `id` and its whole subtree in one step.
    ///
    /// Surviving siblings are renumbered. When the active page was removed,
    /// the next active page is a remaining sibling, else the former parent,
    /// else the first root page. Returns the number of removed pages; `0`
    /// means `id` was unknown and nothing happened.
    pub fn delete(&mut self, id: &PageId) -> usize {
        let Some(index) = find_index(&self.pages, id) else {
            debug!("event=page_delete module=store status=skip reason=not_found page_id={id}");
            return 0;
        };
        let former_parent = self.pages[index].parent_id.clone();
        let former_order = self.pages[index].order;

        let subtree = collect_subtree(&self.pages, id);
        let removed: Vec<PageId> = self
            .pages
            .iter()
            .filter(|page| subtree.contains(&page.id))
            .map(|page| page.id.clone())
            .collect();
        self.pages.retain(|page| !subtree.contains(&page.id));
        normalize_orders(&mut self.pages);

        let mut events = vec![StoreEvent::Deleted {
            ids: removed.clone(),
        }];
        if self
            .active
            .as_ref()
            .is_some_and(|active| subtree.contains(active))
        {
            self.active = self.successor_after_delete(former_parent.as_ref(), former_order);
            events.push(StoreEvent::ActiveChanged {
                id: self.active.clone(),
            });
        }

        info!(
            "event=page_delete module=store status=ok page_id={} removed_count={}",
            id,
            removed.len()
        );
        self.commit(events);
        removed.len()
    }

    /// Sets the title of `id`. Returns `false` when `id` is unknown.
    pub fn rename(&mut self, id: &PageId, title: impl Into<String>) -> bool {
        let Some(index) = find_index(&self.pages, id) else {
            debug!("event=page_rename module=store status=skip reason=not_found page_id={id}");
            return false;
        };
        let title = title.into();
        if self.pages[index].title == title {
            return true;
        }
        self.pages[index].title = title;
        self.commit(vec![StoreEvent::Renamed { id: id.clone() }]);
        true
    }

    /// Moves `dragged` before, after, or inside `target`.
    ///
    /// Refused moves leave the collection untouched: dropping a page onto
    /// itself, unknown ids, dropping onto one of its own descendants, and
    /// `Inside` drops onto documents.
    pub fn move_page(
        &mut self,
        dragged: &PageId,
        target: &PageId,
        position: DropPosition,
    ) -> MoveOutcome {
        match self.check_move(dragged, target, position) {
            Err(rejection) => {
                debug!(
                    "event=page_move module=store status=skip page_id={dragged} target_id={target} position={position:?} reason={rejection:?}"
                );
                MoveOutcome::Rejected(rejection)
            }
            Ok(()) => {
                let mut working = self.pages.clone();
                if !place_page(&mut working, dragged, target, position) || working == self.pages
                {
                    return MoveOutcome::Unchanged;
                }
                self.pages = working;
                info!(
                    "event=page_move module=store status=ok page_id={dragged} target_id={target} position={position:?}"
                );
                self.commit(vec![StoreEvent::Moved {
                    id: dragged.clone(),
                }]);
                MoveOutcome::Moved
            }
        }
    }

    /// Shallow-merges `patch` into `id`. Returns `false` when `id` is unknown.
    pub fn update_page_meta(&mut self, id: &PageId, patch: &PageMetaPatch) -> bool {
        let Some(index) = find_index(&self.pages, id) else {
            debug!("event=page_meta module=store status=skip reason=not_found page_id={id}");
            return false;
        };
        if patch.apply(&mut self.pages[index]) {
            self.commit(vec![StoreEvent::MetaUpdated { id: id.clone() }]);
        }
        true
    }

    /// Replaces the editor payload of `id`. Returns `false` when unknown.
    pub fn update_content(&mut self, id: &PageId, content: impl Into<String>) -> bool {
        let Some(index) = find_index(&self.pages, id) else {
            return false;
        };
        let content = content.into();
        if self.pages[index].content != content {
            self.pages[index].content = content;
            self.commit(vec![StoreEvent::ContentUpdated { id: id.clone() }]);
        }
        true
    }

    /// Makes `id` the active page. Returns `false` when unknown.
    ///
    /// Selection is not part of the saved snapshot, so nothing is persisted.
    pub fn select(&mut self, id: &PageId) -> bool {
        if find_index(&self.pages, id).is_none() {
            return false;
        }
        if self.active.as_ref() != Some(id) {
            self.active = Some(id.clone());
            self.notify(&[StoreEvent::ActiveChanged {
                id: Some(id.clone()),
            }]);
        }
        true
    }

    /// Appends an open to-do to `page_id`.
    ///
    /// Returns `None` when the page is unknown or `text` is blank.
    pub fn add_todo(&mut self, page_id: &PageId, text: &str) -> Option<TodoId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let index = find_index(&self.pages, page_id)?;
        let todo = TodoItem {
            id: TodoId::generate(),
            text: text.to_string(),
            completed: false,
        };
        let todo_id = todo.id.clone();
        self.pages[index].todos.push(todo);
        self.commit(vec![StoreEvent::TodosUpdated {
            id: page_id.clone(),
        }]);
        Some(todo_id)
    }

    /// Flips the completion flag of one to-do. Returns `false` when unknown.
    pub fn toggle_todo(&mut self, page_id: &PageId, todo_id: &TodoId) -> bool {
        let Some(index) = find_index(&self.pages, page_id) else {
            return false;
        };
        let Some(todo) = self.pages[index]
            .todos
            .iter_mut()
            .find(|todo| &todo.id == todo_id)
        else {
            return false;
        };
        todo.completed = !todo.completed;
        self.commit(vec![StoreEvent::TodosUpdated {
            id: page_id.clone(),
        }]);
        true
    }

    /// Removes one to-do. Returns `false` when unknown.
    pub fn remove_todo(&mut self, page_id: &PageId, todo_id: &TodoId) -> bool {
        let Some(index) = find_index(&self.pages, page_id) else {
            return false;
        };
        let todos = &mut self.pages[index].todos;
        let before = todos.len();
        todos.retain(|todo| &todo.id != todo_id);
        if todos.len() == before {
            return false;
        }
        self.commit(vec![StoreEvent::TodosUpdated {
            id: page_id.clone(),
        }]);
        true
    }

    fn check_move(
        &self,
        dragged: &PageId,
        target: &PageId,
        position: DropPosition,
    ) -> Result<(), MoveRejection> {
        if dragged == target {
            return Err(MoveRejection::SameTarget);
        }
        if find_index(&self.pages, dragged).is_none() {
            return Err(MoveRejection::NotFound(dragged.clone()));
        }
        let target_page = self
            .get(target)
            .ok_or_else(|| MoveRejection::NotFound(target.clone()))?;
        if is_ancestor_or_self(&self.pages, dragged, target) {
            return Err(MoveRejection::Cycle);
        }
        if position == DropPosition::Inside && !target_page.is_folder {
            return Err(MoveRejection::TargetNotFolder);
        }
        Ok(())
    }

    fn successor_after_delete(
        &self,
        former_parent: Option<&PageId>,
        former_order: i64,
    ) -> Option<PageId> {
        let siblings = sorted_siblings(&self.pages, former_parent);
        if let Some(last) = siblings.len().checked_sub(1) {
            let slot = usize::try_from(former_order).unwrap_or(0).min(last);
            return Some(siblings[slot].id.clone());
        }
        if let Some(parent_id) = former_parent {
            if find_index(&self.pages, parent_id).is_some() {
                return Some(parent_id.clone());
            }
        }
        self.fallback_active()
    }

    fn fallback_active(&self) -> Option<PageId> {
        sorted_siblings(&self.pages, None)
            .first()
            .map(|page| page.id.clone())
            .or_else(|| self.pages.first().map(|page| page.id.clone()))
    }

    fn commit(&mut self, events: Vec<StoreEvent>) {
        self.persist();
        self.notify(&events);
    }

    fn persist(&self) {
        match self.repo.save_pages(&self.user_key, &self.pages) {
            Ok(()) => debug!(
                "event=pages_save module=store status=ok user_key={} page_count={}",
                self.user_key,
                self.pages.len()
            ),
            Err(err) => error!(
                "event=pages_save module=store status=error user_key={} page_count={} error={}",
                self.user_key,
                self.pages.len(),
                err
            ),
        }
    }

    fn notify(&mut self, events: &[StoreEvent]) {
        for event in events {
            for (_, listener) in &mut self.listeners {
                listener(event);
            }
        }
    }
}
