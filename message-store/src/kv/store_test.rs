//! Unit tests for KvMessageStore.
//!
//! Run against MemoryBackend for behavior, and MockKvBackend for backend failures.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use super::{KvBackend, KvMessageStore, MemoryBackend, MockKvBackend};
use crate::error::{BackendError, StoreError};
use crate::models::{message_key, FindAllPage, Message, MESSAGES_SET};
use crate::repository::MessageRepository;

fn store() -> KvMessageStore<MemoryBackend> {
    KvMessageStore::new(MemoryBackend::new())
}

fn message(text: &str) -> Message {
    Message::new(Uuid::now_v7(), text)
}

/// Follows cursors until 0 and returns every id seen, in order.
async fn collect_ids<R: MessageRepository>(repo: &R, size: u64) -> Vec<Uuid> {
    let mut ids = Vec::new();
    let mut page = FindAllPage::first(size);
    loop {
        let result = repo.find_all(page).await.expect("find_all");
        ids.extend(result.messages.iter().map(|m| m.id));
        if result.is_last() {
            return ids;
        }
        page.offset = result.cursor;
    }
}

#[tokio::test]
async fn test_insert_then_get_round_trips() {
    let store = store();
    let m = message("hello");

    store.insert(&m).await.expect("insert");
    let fetched = store.get(m.id).await.expect("get");

    assert_eq!(fetched, m);
}

#[tokio::test]
async fn test_insert_writes_record_and_index_entry() {
    let store = store();
    let m = message("hello");
    store.insert(&m).await.unwrap();

    let raw = store.backend().get(&message_key(m.id)).await.unwrap();
    assert!(raw.is_some());
    let (members, _) = store
        .backend()
        .set_scan(MESSAGES_SET, 0, "*", 10)
        .await
        .unwrap();
    assert_eq!(members, vec![message_key(m.id)]);
}

#[tokio::test]
async fn test_duplicate_insert_fails_and_keeps_first_record() {
    let store = store();
    let first = message("first");
    let mut second = message("second");
    second.id = first.id;

    store.insert(&first).await.unwrap();
    let err = store.insert(&second).await.unwrap_err();

    assert!(matches!(err, StoreError::AlreadyExists(id) if id == first.id));
    assert_eq!(store.get(first.id).await.unwrap().text, "first");
}

#[tokio::test]
async fn test_concurrent_inserts_of_same_id_have_one_winner() {
    let store = Arc::new(store());
    let template = message("race");

    let mut tasks = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let mut m = template.clone();
        m.text = format!("writer {}", i);
        tasks.push(tokio::spawn(async move { store.insert(&m).await }));
    }

    let mut wins = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => wins += 1,
            Err(e) => assert!(matches!(e, StoreError::AlreadyExists(_))),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(collect_ids(store.as_ref(), 10).await, vec![template.id]);
}

#[tokio::test]
async fn test_unknown_id_is_not_found_everywhere() {
    let store = store();
    let ghost = message("ghost");

    assert!(store.get(ghost.id).await.unwrap_err().is_not_found());
    assert!(store.update(&ghost).await.unwrap_err().is_not_found());
    assert!(store.delete(ghost.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_deleted_id_is_not_found_everywhere() {
    let store = store();
    let m = message("short lived");
    store.insert(&m).await.unwrap();
    store.delete(m.id).await.unwrap();

    assert!(store.get(m.id).await.unwrap_err().is_not_found());
    assert!(store.update(&m).await.unwrap_err().is_not_found());
    assert!(store.delete(m.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_update_does_not_create() {
    let store = store();
    let m = message("never inserted");

    assert!(store.update(&m).await.unwrap_err().is_not_found());
    assert!(store.get(m.id).await.unwrap_err().is_not_found());
    assert!(collect_ids(&store, 10).await.is_empty());
}

#[tokio::test]
async fn test_create_update_delete_scenario() {
    let store = store();
    let created = Utc::now() - Duration::seconds(5);
    let m = Message {
        id: Uuid::now_v7(),
        user_id: Uuid::now_v7(),
        text: "hi".to_string(),
        created_at: Some(created),
        updated_at: Some(created),
    };
    store.insert(&m).await.unwrap();
    assert_eq!(store.get(m.id).await.unwrap().text, "hi");

    let mut revised = store.get(m.id).await.unwrap();
    revised.revise("bye");
    store.update(&revised).await.unwrap();

    let fetched = store.get(m.id).await.unwrap();
    assert_eq!(fetched.id, m.id);
    assert_eq!(fetched.text, "bye");
    assert_eq!(fetched.created_at, Some(created));
    assert!(fetched.updated_at > fetched.created_at);

    store.delete(m.id).await.unwrap();
    assert!(store.get(m.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_update_leaves_index_untouched() {
    let store = store();
    let mut m = message("before");
    store.insert(&m).await.unwrap();

    m.revise("after");
    store.update(&m).await.unwrap();

    assert_eq!(collect_ids(&store, 10).await, vec![m.id]);
}

#[tokio::test]
async fn test_find_all_on_empty_store() {
    let store = store();
    let result = store.find_all(FindAllPage::first(50)).await.unwrap();
    assert!(result.messages.is_empty());
    assert_eq!(result.cursor, 0);
}

#[tokio::test]
async fn test_pagination_yields_every_message_once() {
    let store = store();
    let mut inserted = HashSet::new();
    for i in 0..120 {
        let m = message(&format!("message {}", i));
        inserted.insert(m.id);
        store.insert(&m).await.unwrap();
    }

    let first = store.find_all(FindAllPage::first(50)).await.unwrap();
    assert!(first.messages.len() <= 50);
    assert_ne!(first.cursor, 0);

    let ids = collect_ids(&store, 50).await;
    let unique: HashSet<Uuid> = ids.iter().copied().collect();
    assert_eq!(ids.len(), 120);
    assert_eq!(unique, inserted);
}

#[tokio::test]
async fn test_pagination_tolerates_interleaved_deletes() {
    let store = store();
    let mut inserted = Vec::new();
    for i in 0..30 {
        let m = message(&format!("message {}", i));
        inserted.push(m.id);
        store.insert(&m).await.unwrap();
    }

    let first = store.find_all(FindAllPage::first(10)).await.unwrap();
    assert_ne!(first.cursor, 0);
    let mut seen: HashSet<Uuid> = first.messages.iter().map(|m| m.id).collect();

    // One already returned, one still ahead of the cursor.
    let already_seen = first.messages[0].id;
    store.delete(already_seen).await.unwrap();
    let pending = *inserted.iter().find(|id| !seen.contains(*id)).unwrap();
    store.delete(pending).await.unwrap();

    let mut page = FindAllPage {
        offset: first.cursor,
        size: 10,
    };
    loop {
        let result = store.find_all(page).await.expect("page after deletes");
        assert!(result.messages.iter().all(|m| m.id != pending));
        seen.extend(result.messages.iter().map(|m| m.id));
        if result.is_last() {
            break;
        }
        page.offset = result.cursor;
    }

    let untouched: HashSet<Uuid> = inserted
        .iter()
        .copied()
        .filter(|id| *id != already_seen && *id != pending)
        .collect();
    assert!(
        untouched.is_subset(&seen),
        "records present for the whole traversal must all be listed"
    );
}

#[tokio::test]
async fn test_deleted_message_never_listed() {
    let store = store();
    let keep = message("keep");
    let gone = message("gone");
    store.insert(&keep).await.unwrap();
    store.insert(&gone).await.unwrap();

    store.delete(gone.id).await.unwrap();

    assert_eq!(collect_ids(&store, 1).await, vec![keep.id]);
}

#[tokio::test]
async fn test_find_all_skips_index_entries_without_record() {
    let store = store();
    let m = message("present");
    store.insert(&m).await.unwrap();
    store
        .backend()
        .set_add(MESSAGES_SET, &message_key(Uuid::now_v7()))
        .await
        .unwrap();

    let result = store.find_all(FindAllPage::first(50)).await.unwrap();
    assert_eq!(result.messages, vec![m]);
}

#[tokio::test]
async fn test_corrupt_record_fails_get_and_whole_page() {
    let store = store();
    store.insert(&message("fine")).await.unwrap();
    let id = Uuid::now_v7();
    let key = message_key(id);
    store.backend().set_if_absent(&key, "{not json").await.unwrap();
    store.backend().set_add(MESSAGES_SET, &key).await.unwrap();

    let err = store.get(id).await.unwrap_err();
    assert!(matches!(err, StoreError::Decode { key: ref k, .. } if *k == key));

    let err = store.find_all(FindAllPage::first(50)).await.unwrap_err();
    assert!(matches!(err, StoreError::Decode { .. }));
}

#[tokio::test]
async fn test_close_stops_further_use() {
    let store = store();
    store.ping().await.expect("ping before close");
    store.close().await.expect("first close");

    assert!(matches!(store.ping().await, Err(StoreError::Closed)));
    assert!(matches!(
        store.insert(&message("late")).await,
        Err(StoreError::Closed)
    ));
}

#[tokio::test]
async fn test_reconcile_repairs_index() {
    let store = store();
    let indexed = message("indexed");
    store.insert(&indexed).await.unwrap();

    let orphan = message("orphan");
    let orphan_key = message_key(orphan.id);
    store
        .backend()
        .set_if_absent(&orphan_key, &serde_json::to_string(&orphan).unwrap())
        .await
        .unwrap();
    let dangling_key = message_key(Uuid::now_v7());
    store
        .backend()
        .set_add(MESSAGES_SET, &dangling_key)
        .await
        .unwrap();

    let report = store.reconcile(100).await.unwrap();

    assert_eq!(report.scanned_index_entries, 2);
    assert_eq!(report.removed_index_entries, 1);
    assert_eq!(report.scanned_records, 2);
    assert_eq!(report.reindexed_records, 1);

    let ids: HashSet<Uuid> = collect_ids(&store, 50).await.into_iter().collect();
    assert_eq!(ids, HashSet::from([indexed.id, orphan.id]));

    let again = store.reconcile(100).await.unwrap();
    assert_eq!(again.removed_index_entries, 0);
    assert_eq!(again.reindexed_records, 0);
}

#[tokio::test]
async fn test_reconcile_withdraws_key_deleted_mid_sweep() {
    let gone = message("deleted while reconciling").key();
    let scanned = vec![gone.clone()];
    let expected = gone.clone();

    let mut backend = MockKvBackend::new();
    backend
        .expect_set_scan()
        .returning(|_, _, _, _| Ok((Vec::new(), 0)));
    backend
        .expect_scan_keys()
        .times(1)
        .returning(move |_, _, _| Ok((scanned.clone(), 0)));
    backend
        .expect_set_add()
        .times(1)
        .returning(|_, _| Ok(true));
    backend.expect_get().times(1).returning(|_| Ok(None));
    backend
        .expect_set_remove()
        .withf(move |set, member| set == MESSAGES_SET && *member == expected)
        .times(1)
        .returning(|_, _| Ok(true));
    let store = KvMessageStore::new(backend);

    let report = store.reconcile(10).await.unwrap();

    assert_eq!(report.scanned_records, 1);
    assert_eq!(report.reindexed_records, 0);
}

#[tokio::test]
async fn test_failed_grouped_write_is_indeterminate() {
    let mut backend = MockKvBackend::new();
    backend
        .expect_exec_atomic()
        .times(2)
        .returning(|_| Err(BackendError::Protocol("connection reset".to_string())));
    let store = KvMessageStore::new(backend);
    let m = message("lost");

    let err = store.insert(&m).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Indeterminate { operation: "insert", id, .. } if id == m.id
    ));

    let err = store.delete(m.id).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Indeterminate { operation: "delete", .. }
    ));
}

#[tokio::test]
async fn test_backend_failure_is_not_not_found() {
    let mut backend = MockKvBackend::new();
    backend
        .expect_get()
        .returning(|_| Err(BackendError::Protocol("timeout".to_string())));
    backend
        .expect_set_if_present()
        .returning(|_, _| Err(BackendError::Protocol("timeout".to_string())));
    let store = KvMessageStore::new(backend);
    let m = message("x");

    let err = store.get(m.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend { operation: "get", .. }));
    assert!(err.to_string().contains(&m.id.to_string()));

    let err = store.update(&m).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend { operation: "update", .. }));
}

#[tokio::test]
async fn test_find_all_fetches_page_in_scan_order_with_one_multi_get() {
    let first = message("one");
    let second = message("two");
    let values = vec![
        Some(serde_json::to_string(&second).unwrap()),
        Some(serde_json::to_string(&first).unwrap()),
    ];

    let mut backend = MockKvBackend::new();
    let scanned = vec![second.key(), first.key()];
    backend
        .expect_set_scan()
        .withf(|set, cursor, pattern, count| {
            set == MESSAGES_SET && *cursor == 7 && pattern == "*" && *count == 2
        })
        .times(1)
        .returning(move |_, _, _, _| Ok((scanned.clone(), 42)));
    backend
        .expect_multi_get()
        .times(1)
        .returning(move |requested| {
            assert_eq!(requested.len(), 2);
            Ok(values.clone())
        });
    let store = KvMessageStore::new(backend);

    let result = store
        .find_all(FindAllPage { offset: 7, size: 2 })
        .await
        .unwrap();

    assert_eq!(result.cursor, 42);
    assert_eq!(result.messages, vec![second, first]);
}

#[tokio::test]
async fn test_empty_intermediate_page_keeps_cursor() {
    let mut backend = MockKvBackend::new();
    backend
        .expect_set_scan()
        .returning(|_, _, _, _| Ok((Vec::new(), 99)));
    let store = KvMessageStore::new(backend);

    let result = store.find_all(FindAllPage::first(50)).await.unwrap();

    assert!(result.messages.is_empty());
    assert_eq!(result.cursor, 99);
    assert!(!result.is_last());
}

#[tokio::test]
async fn test_zero_page_size_still_asks_for_one() {
    let mut backend = MockKvBackend::new();
    backend
        .expect_set_scan()
        .withf(|_, _, _, count| *count == 1)
        .returning(|_, _, _, _| Ok((Vec::new(), 0)));
    let store = KvMessageStore::new(backend);

    let result = store.find_all(FindAllPage::first(0)).await.unwrap();
    assert!(result.is_last());
}
