use brainnote_core::db::open_db_in_memory;
use brainnote_core::{
    DropPosition, MemoryPageRepository, MoveOutcome, MoveRejection, Page, PageId, PageMetaPatch,
    PageRepository, PageStore, PageStoreError, SqlitePageRepository, StoreEvent,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const KEY: &str = "pages:test";

fn seeded(pages: Vec<Page>) -> MemoryPageRepository {
    let repo = MemoryPageRepository::new();
    repo.save_pages(KEY, &pages).unwrap();
    repo
}

fn root(id: &str, order: i64) -> Page {
    Page::with_id(PageId::from(id), None, order, false, id.to_uppercase())
}

fn folder(id: &str, parent: Option<&str>, order: i64) -> Page {
    Page::with_id(
        PageId::from(id),
        parent.map(PageId::from),
        order,
        true,
        id.to_uppercase(),
    )
}

fn doc(id: &str, parent: &str, order: i64) -> Page {
    Page::with_id(
        PageId::from(id),
        Some(PageId::from(parent)),
        order,
        false,
        id.to_uppercase(),
    )
}

fn order_of<R: PageRepository>(store: &PageStore<R>, id: &str) -> i64 {
    store.get(&PageId::from(id)).unwrap().order
}

fn assert_invariants<R: PageRepository>(store: &PageStore<R>) {
    let pages = store.pages();

    let mut groups: HashMap<Option<PageId>, Vec<i64>> = HashMap::new();
    for page in pages {
        if let Some(parent_id) = &page.parent_id {
            assert!(
                store.get(parent_id).is_some(),
                "dangling parent {parent_id} on {}",
                page.id
            );
        }
        groups
            .entry(page.parent_id.clone())
            .or_default()
            .push(page.order);
    }
    for (_, mut orders) in groups {
        orders.sort_unstable();
        let expected: Vec<i64> = (0..orders.len() as i64).collect();
        assert_eq!(orders, expected);
    }

    for page in pages {
        let mut steps = 0;
        let mut cursor = page.parent_id.clone();
        while let Some(current) = cursor {
            steps += 1;
            assert!(steps <= pages.len(), "parent cycle through {}", page.id);
            cursor = store.get(&current).and_then(|p| p.parent_id.clone());
        }
    }

    match store.active_page_id() {
        Some(active) => assert!(store.get(active).is_some()),
        None => assert!(pages.is_empty()),
    }
}

#[test]
fn add_appends_to_root_and_becomes_active() {
    let repo = seeded(vec![root("1", 0)]);
    let mut store = PageStore::open(&repo, KEY);

    let added = store.add(None, false, Some("B")).unwrap();

    assert_eq!(added.order, 1);
    assert!(added.parent_id.is_none());
    assert_eq!(added.title, "B");
    assert_eq!(store.active_page_id(), Some(&added.id));
    assert_eq!(order_of(&store, "1"), 0);
    assert_invariants(&store);
}

#[test]
fn add_uses_default_titles_and_counts_siblings_per_parent() {
    let repo = MemoryPageRepository::new();
    let mut store = PageStore::open(&repo, KEY);

    let projects = store.add(None, true, None).unwrap();
    let first = store.add(Some(&projects.id), false, Some("  ")).unwrap();
    let second = store.add(Some(&projects.id), false, None).unwrap();

    assert_eq!(projects.title, "New Folder");
    assert_eq!(first.title, "Untitled Page");
    assert_eq!(first.order, 0);
    assert_eq!(second.order, 1);
    assert_eq!(second.parent_id, Some(projects.id.clone()));
    assert!(first.content.is_empty() && first.todos.is_empty() && first.tags.is_empty());
}

#[test]
fn add_with_unknown_parent_fails_without_creating_anything() {
    let repo = seeded(vec![root("1", 0)]);
    let mut store = PageStore::open(&repo, KEY);
    let saves = repo.save_count();

    let err = store
        .add(Some(&PageId::from("ghost")), false, None)
        .unwrap_err();

    assert!(matches!(err, PageStoreError::InvalidParent(id) if id.as_str() == "ghost"));
    assert_eq!(store.len(), 1);
    assert_eq!(store.active_page_id(), Some(&PageId::from("1")));
    assert_eq!(repo.save_count(), saves);
}

#[test]
fn move_before_reorders_root_siblings() {
    let repo = seeded(vec![root("a", 0), root("b", 1), root("c", 2)]);
    let mut store = PageStore::open(&repo, KEY);

    let outcome = store.move_page(&PageId::from("c"), &PageId::from("a"), DropPosition::Before);

    assert_eq!(outcome, MoveOutcome::Moved);
    assert_eq!(order_of(&store, "c"), 0);
    assert_eq!(order_of(&store, "a"), 1);
    assert_eq!(order_of(&store, "b"), 2);
    assert_invariants(&store);
}

#[test]
fn move_after_into_other_group_reparents_and_closes_gap() {
    let repo = seeded(vec![
        folder("f", None, 0),
        root("x", 1),
        root("y", 2),
        doc("g", "f", 0),
        doc("h", "f", 1),
    ]);
    let mut store = PageStore::open(&repo, KEY);

    let outcome = store.move_page(&PageId::from("x"), &PageId::from("g"), DropPosition::After);

    assert_eq!(outcome, MoveOutcome::Moved);
    let moved = store.get(&PageId::from("x")).unwrap();
    assert_eq!(moved.parent_id, Some(PageId::from("f")));
    assert_eq!(order_of(&store, "g"), 0);
    assert_eq!(order_of(&store, "x"), 1);
    assert_eq!(order_of(&store, "h"), 2);
    assert_eq!(order_of(&store, "y"), 1);
    assert_invariants(&store);
}

#[test]
fn move_inside_appends_to_folder_children() {
    let repo = seeded(vec![folder("f", None, 0), root("x", 1), doc("g", "f", 0)]);
    let mut store = PageStore::open(&repo, KEY);

    let outcome = store.move_page(&PageId::from("x"), &PageId::from("f"), DropPosition::Inside);

    assert_eq!(outcome, MoveOutcome::Moved);
    let children: Vec<&str> = store
        .children(Some(&PageId::from("f")))
        .iter()
        .map(|page| page.id.as_str())
        .collect();
    assert_eq!(children, vec!["g", "x"]);
    assert_invariants(&store);
}

#[test]
fn move_into_own_descendant_is_rejected_and_collection_unchanged() {
    let repo = seeded(vec![folder("f", None, 0), folder("g", Some("f"), 0)]);
    let mut store = PageStore::open(&repo, KEY);
    let before = serde_json::to_string(store.pages()).unwrap();
    let saves = repo.save_count();

    let inside = store.move_page(&PageId::from("f"), &PageId::from("g"), DropPosition::Inside);
    let beside = store.move_page(&PageId::from("f"), &PageId::from("g"), DropPosition::Before);

    assert_eq!(inside, MoveOutcome::Rejected(MoveRejection::Cycle));
    assert_eq!(beside, MoveOutcome::Rejected(MoveRejection::Cycle));
    assert_eq!(serde_json::to_string(store.pages()).unwrap(), before);
    assert_eq!(repo.save_count(), saves);
}

#[test]
fn unknown_ids_are_no_ops() {
    let repo = seeded(vec![root("a", 0), root("b", 1)]);
    let mut store = PageStore::open(&repo, KEY);
    let before = store.pages().to_vec();
    let saves = repo.save_count();
    let ghost = PageId::from("ghost");

    assert!(!store.rename(&ghost, "x"));
    assert_eq!(store.delete(&ghost), 0);
    assert_eq!(
        store.move_page(&ghost, &PageId::from("a"), DropPosition::Before),
        MoveOutcome::Rejected(MoveRejection::NotFound(ghost.clone()))
    );
    assert_eq!(
        store.move_page(&PageId::from("a"), &PageId::from("a"), DropPosition::After),
        MoveOutcome::Rejected(MoveRejection::SameTarget)
    );
    assert!(!store.update_page_meta(&ghost, &PageMetaPatch::default()));

    assert_eq!(store.pages(), before.as_slice());
    assert_eq!(repo.save_count(), saves);
}

#[test]
fn delete_cascades_and_reassigns_active_to_sibling() {
    let repo = seeded(vec![
        folder("f", None, 0),
        folder("g", Some("f"), 0),
        doc("h", "g", 0),
        root("s", 1),
    ]);
    let mut store = PageStore::open(&repo, KEY);
    assert!(store.select(&PageId::from("h")));

    let removed = store.delete(&PageId::from("f"));

    assert_eq!(removed, 3);
    assert_eq!(store.len(), 1);
    for id in ["f", "g", "h"] {
        assert!(store.get(&PageId::from(id)).is_none());
    }
    assert_eq!(store.active_page_id(), Some(&PageId::from("s")));
    assert_eq!(order_of(&store, "s"), 0);
    assert_invariants(&store);
}

#[test]
fn delete_falls_back_to_former_parent_then_empty() {
    let repo = seeded(vec![folder("f", None, 0), doc("g", "f", 0)]);
    let mut store = PageStore::open(&repo, KEY);
    store.select(&PageId::from("g"));

    assert_eq!(store.delete(&PageId::from("g")), 1);
    assert_eq!(store.active_page_id(), Some(&PageId::from("f")));

    assert_eq!(store.delete(&PageId::from("f")), 1);
    assert!(store.is_empty());
    assert!(store.active_page_id().is_none());
}

#[test]
fn delete_keeps_active_page_outside_removed_subtree() {
    let repo = seeded(vec![root("a", 0), root("b", 1), root("c", 2)]);
    let mut store = PageStore::open(&repo, KEY);
    store.select(&PageId::from("c"));

    store.delete(&PageId::from("a"));

    assert_eq!(store.active_page_id(), Some(&PageId::from("c")));
    assert_eq!(order_of(&store, "b"), 0);
    assert_eq!(order_of(&store, "c"), 1);
}

#[test]
fn rename_and_meta_updates_are_persisted() {
    let repo = seeded(vec![root("a", 0)]);
    let mut store = PageStore::open(&repo, KEY);
    let id = PageId::from("a");

    assert!(store.rename(&id, "Inbox"));
    assert!(store.update_page_meta(
        &id,
        &PageMetaPatch {
            icon: Some(Some("inbox".to_string())),
            tags: Some(vec!["daily".to_string()]),
            ..PageMetaPatch::default()
        }
    ));
    assert!(store.update_content(&id, "<p>hello</p>"));

    let saved = repo.load_pages(KEY).unwrap().unwrap();
    assert_eq!(saved[0].title, "Inbox");
    assert_eq!(saved[0].icon.as_deref(), Some("inbox"));
    assert_eq!(saved[0].content, "<p>hello</p>");
    assert_eq!(store.tag_index().get("daily"), Some(&1));
}

#[test]
fn todos_can_be_added_toggled_and_removed() {
    let repo = seeded(vec![root("a", 0)]);
    let mut store = PageStore::open(&repo, KEY);
    let id = PageId::from("a");

    assert!(store.add_todo(&id, "   ").is_none());
    let todo = store.add_todo(&id, "call mom").unwrap();
    assert!(store.toggle_todo(&id, &todo));
    assert!(store.get(&id).unwrap().todos[0].completed);
    assert!(store.remove_todo(&id, &todo));
    assert!(!store.remove_todo(&id, &todo));
    assert!(store.get(&id).unwrap().todos.is_empty());
}

#[test]
fn breadcrumb_lists_path_from_root() {
    let repo = seeded(vec![folder("f", None, 0), folder("g", Some("f"), 0), doc("h", "g", 0)]);
    let store = PageStore::open(&repo, KEY);

    let path: Vec<&str> = store
        .breadcrumb(&PageId::from("h"))
        .iter()
        .map(|page| page.id.as_str())
        .collect();
    assert_eq!(path, vec!["f", "g", "h"]);
    assert!(store.breadcrumb(&PageId::from("ghost")).is_empty());
}

#[test]
fn subscribers_see_committed_changes_until_unsubscribed() {
    let repo = MemoryPageRepository::new();
    let mut store = PageStore::open(&repo, KEY);
    let seen: Rc<RefCell<Vec<StoreEvent>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let subscription = store.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    let page = store.add(None, false, None).unwrap();
    store.rename(&page.id, "Renamed");
    store.rename(&PageId::from("ghost"), "nope");

    assert_eq!(
        seen.borrow().as_slice(),
        &[
            StoreEvent::Added {
                id: page.id.clone()
            },
            StoreEvent::ActiveChanged {
                id: Some(page.id.clone())
            },
            StoreEvent::Renamed {
                id: page.id.clone()
            },
        ]
    );

    assert!(store.unsubscribe(subscription));
    assert!(!store.unsubscribe(subscription));
    store.delete(&page.id);
    assert_eq!(seen.borrow().len(), 3);
}

#[test]
fn save_failures_are_swallowed_and_store_keeps_working() {
    let repo = MemoryPageRepository::new();
    repo.set_simulate_write_error(true);
    let mut store = PageStore::open(&repo, KEY);

    let page = store.add(None, false, Some("A")).unwrap();
    assert!(store.rename(&page.id, "B"));
    assert_eq!(store.get(&page.id).unwrap().title, "B");
    assert!(store.flush().is_err());

    repo.set_simulate_write_error(false);
    store.flush().unwrap();
    assert_eq!(repo.load_pages(KEY).unwrap().unwrap().len(), 1);
}

#[test]
fn corrupt_snapshot_opens_as_empty_store() {
    let repo = MemoryPageRepository::new();
    repo.insert_raw(KEY, "[{\"id\":");

    let store = PageStore::open(&repo, KEY);
    assert!(store.is_empty());
    assert!(store.active_page_id().is_none());
}

#[test]
fn loaded_snapshot_is_repaired_before_use() {
    let repo = seeded(vec![
        folder("a", Some("b"), 0),
        folder("b", Some("a"), 0),
        doc("orphan", "gone", 5),
        root("r", 7),
    ]);
    let store = PageStore::open(&repo, KEY);

    assert_eq!(store.len(), 4);
    assert!(store.get(&PageId::from("orphan")).unwrap().parent_id.is_none());
    assert!(store.active_page_id().is_some());
    assert_invariants(&store);
}

#[test]
fn reopening_restores_saved_tree() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let folder_id;
    {
        let mut store = PageStore::open(&repo, KEY);
        let projects = store.add(None, true, Some("Projects")).unwrap();
        store.add(Some(&projects.id), false, Some("Plan")).unwrap();
        folder_id = projects.id;
        store.dispose();
    }

    let store = PageStore::open(&repo, KEY);
    assert_eq!(store.len(), 2);
    assert_eq!(store.children(Some(&folder_id))[0].title, "Plan");
    assert_eq!(store.active_page_id(), Some(&folder_id));
}

#[test]
fn random_operation_sequences_preserve_invariants() {
    let repo = MemoryPageRepository::new();
    let mut store = PageStore::open(&repo, KEY);
    let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = move |bound: usize| {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed % bound as u64) as usize
    };
    let positions = [DropPosition::Before, DropPosition::After, DropPosition::Inside];

    for _ in 0..400 {
        let ids: Vec<PageId> = store.pages().iter().map(|page| page.id.clone()).collect();
        match next(6) {
            0 | 1 => {
                let parent = if ids.is_empty() || next(3) == 0 {
                    None
                } else {
                    Some(ids[next(ids.len())].clone())
                };
                store.add(parent.as_ref(), next(2) == 0, None).unwrap();
            }
            2 if !ids.is_empty() => {
                let victim = &ids[next(ids.len())];
                let expected = store
                    .pages()
                    .iter()
                    .filter(|page| {
                        store
                            .breadcrumb(&page.id)
                            .iter()
                            .any(|ancestor| &ancestor.id == victim)
                    })
                    .count();
                let before = store.len();
                assert_eq!(store.delete(victim), expected);
                assert_eq!(store.len(), before - expected);
            }
            _ if ids.len() >= 2 => {
                let dragged = &ids[next(ids.len())];
                let target = &ids[next(ids.len())];
                store.move_page(dragged, target, positions[next(3)]);
            }
            _ => {}
        }
        assert_invariants(&store);
    }
}
