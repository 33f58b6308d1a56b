//! Pure page-tree algorithms.
//!
//! # Responsibility
//! - Traverse the parent relation (subtree, ancestor chain).
//! - Compute drag-and-drop placement on a working copy of the collection.
//! - Keep sibling `order` contiguous and repair snapshots read from storage.
//!
//! # Invariants
//! - After `normalize_orders`, every sibling group is ordered `0..n-1`.
//! - Ancestor walks are guarded by a visited set and terminate on any input.
//! - Sibling order ties are broken by collection position, never by id.

use crate::model::drop::DropPosition;
use crate::model::page::{Page, PageId};
use std::collections::{HashMap, HashSet, VecDeque};

/// Outcome of load-time sanitation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Records dropped because an earlier record used the same id.
    pub duplicates_dropped: usize,
    /// Pages moved to root because their parent was missing or cyclic.
    pub reparented: usize,
    /// Whether any sibling `order` had to be rewritten.
    pub reordered: bool,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates_dropped == 0 && self.reparented == 0 && !self.reordered
    }
}

/// Returns the position of `id` in the collection.
pub fn find_index(pages: &[Page], id: &PageId) -> Option<usize> {
    pages.iter().position(|page| &page.id == id)
}

/// Collects `root` and all of its transitive descendants.
///
/// Traversal is breadth-first over the parent relation. Returns an empty set
/// when `root` is not in the collection.
pub fn collect_subtree(pages: &[Page], root: &PageId) -> HashSet<PageId> {
    let mut subtree = HashSet::new();
    if find_index(pages, root).is_none() {
        return subtree;
    }

    let mut children: HashMap<&PageId, Vec<&PageId>> = HashMap::new();
    for page in pages {
        if let Some(parent_id) = &page.parent_id {
            children.entry(parent_id).or_default().push(&page.id);
        }
    }

    subtree.insert(root.clone());
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        let Some(child_ids) = children.get(current) else {
            continue;
        };
        for child_id in child_ids {
            if subtree.insert((*child_id).clone()) {
                queue.push_back(*child_id);
            }
        }
    }
    subtree
}

/// Returns whether `candidate` is `node` itself or one of its ancestors.
///
/// A parent loop in corrupt input is reported as `true`.
pub fn is_ancestor_or_self(pages: &[Page], candidate: &PageId, node: &PageId) -> bool {
    let parents: HashMap<&PageId, Option<&PageId>> = pages
        .iter()
        .map(|page| (&page.id, page.parent_id.as_ref()))
        .collect();

    let mut visited = HashSet::new();
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if current == candidate {
            return true;
        }
        if !visited.insert(current) {
            return true;
        }
        cursor = parents.get(current).copied().flatten();
    }
    false
}

/// Returns the ancestor chain of `id`, root first, `id` excluded.
pub fn ancestors(pages: &[Page], id: &PageId) -> Vec<PageId> {
    let mut chain = Vec::new();
    let mut visited = HashSet::from([id.clone()]);
    let mut cursor = find_index(pages, id).and_then(|index| pages[index].parent_id.clone());
    while let Some(current) = cursor {
        if !visited.insert(current.clone()) {
            break;
        }
        cursor = find_index(pages, &current).and_then(|index| pages[index].parent_id.clone());
        chain.push(current);
    }
    chain.reverse();
    chain
}

/// Returns one sibling group sorted by `order`.
pub fn sorted_siblings<'a>(pages: &'a [Page], parent_id: Option<&PageId>) -> Vec<&'a Page> {
    let mut siblings: Vec<&Page> = pages
        .iter()
        .filter(|page| page.parent_id.as_ref() == parent_id)
        .collect();
    siblings.sort_by_key(|page| page.order);
    siblings
}

/// Reassigns `order = 0..n-1` inside every sibling group.
///
/// Each group keeps its current relative order. Returns `true` when any
/// page's `order` changed.
pub fn normalize_orders(pages: &mut [Page]) -> bool {
    let mut groups: HashMap<Option<PageId>, Vec<usize>> = HashMap::new();
    for (index, page) in pages.iter().enumerate() {
        groups.entry(page.parent_id.clone()).or_default().push(index);
    }

    let mut changed = false;
    for mut indexes in groups.into_values() {
        indexes.sort_by_key(|index| pages[*index].order);
        for (position, index) in indexes.into_iter().enumerate() {
            let position = position as i64;
            if pages[index].order != position {
                pages[index].order = position;
                changed = true;
            }
        }
    }
    changed
}

/// Places `dragged` relative to `target` and renormalizes all groups.
///
/// Callers must have checked that both pages exist, differ, and that the
/// move cannot create a cycle. Returns `false` without touching `pages` when
/// either page is missing.
pub fn place_page(
    pages: &mut [Page],
    dragged: &PageId,
    target: &PageId,
    position: DropPosition,
) -> bool {
    let (Some(dragged_index), Some(target_index)) =
        (find_index(pages, dragged), find_index(pages, target))
    else {
        return false;
    };

    let (new_parent, new_order) = match position {
        DropPosition::Inside => {
            let child_count = pages
                .iter()
                .filter(|page| page.parent_id.as_ref() == Some(target) && &page.id != dragged)
                .count();
            (Some(target.clone()), child_count as i64)
        }
        DropPosition::Before | DropPosition::After => {
            let parent = pages[target_index].parent_id.clone();
            let siblings: Vec<PageId> = sorted_siblings(pages, parent.as_ref())
                .into_iter()
                .filter(|page| &page.id != dragged)
                .map(|page| page.id.clone())
                .collect();
            let Some(anchor) = siblings.iter().position(|id| id == target) else {
                return false;
            };
            let insert_at = match position {
                DropPosition::After => anchor + 1,
                _ => anchor,
            };

            for (slot, sibling_id) in siblings.iter().enumerate() {
                if let Some(index) = find_index(pages, sibling_id) {
                    let shifted = if slot >= insert_at { slot + 1 } else { slot };
                    pages[index].order = shifted as i64;
                }
            }
            (parent, insert_at as i64)
        }
    };

    let page = &mut pages[dragged_index];
    page.parent_id = new_parent;
    page.order = new_order;
    normalize_orders(pages);
    true
}

/// Sanitizes a snapshot read from storage.
///
/// Drops duplicate ids (first record wins), moves pages with a missing or
/// cyclic parent to root level, then renormalizes every sibling group.
pub fn repair_loaded(pages: Vec<Page>) -> (Vec<Page>, RepairReport) {
    let mut report = RepairReport::default();

    let mut seen = HashSet::new();
    let mut pages: Vec<Page> = pages
        .into_iter()
        .filter(|page| {
            let fresh = seen.insert(page.id.clone());
            if !fresh {
                report.duplicates_dropped += 1;
            }
            fresh
        })
        .collect();

    for page in &mut pages {
        let dangling = page
            .parent_id
            .as_ref()
            .is_some_and(|parent_id| parent_id == &page.id || !seen.contains(parent_id));
        if dangling {
            page.parent_id = None;
            report.reparented += 1;
        }
    }

    let mut parents: HashMap<PageId, Option<PageId>> = pages
        .iter()
        .map(|page| (page.id.clone(), page.parent_id.clone()))
        .collect();
    for page in &mut pages {
        if sits_on_parent_cycle(&parents, &page.id) {
            page.parent_id = None;
            parents.insert(page.id.clone(), None);
            report.reparented += 1;
        }
    }

    report.reordered = normalize_orders(&mut pages);
    (pages, report)
}

fn sits_on_parent_cycle(parents: &HashMap<PageId, Option<PageId>>, id: &PageId) -> bool {
    let mut visited = HashSet::new();
    let mut cursor = parents.get(id).cloned().flatten();
    while let Some(current) = cursor {
        if &current == id {
            return true;
        }
        if !visited.insert(current.clone()) {
            return false;
        }
        cursor = parents.get(&current).cloned().flatten();
    }
    false
}
