//! Integration tests for EventStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use futurykon_events::{AppendEvent, EventStore};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

/// Get a migrated, empty test store, or skip if no test DB is available.
async fn test_store() -> Option<EventStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    let store = EventStore::new(pool.clone());
    store.migrate().await.ok()?;

    // Clean slate for each test
    sqlx::query("TRUNCATE events RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .ok()?;

    Some(store)
}

// =========================================================================
// Basic behavior tests
// =========================================================================

#[tokio::test]
async fn append_assigns_seq_and_timestamp() {
    let Some(store) = test_store().await else {
        return;
    };

    let stored = store
        .append_and_read(AppendEvent::new("test_event", json!({"key": "value"})))
        .await
        .unwrap();

    assert!(stored.seq > 0);
    assert!(stored.parent_seq.is_none());
    assert!(stored.caused_by_seq.is_none());
    assert_eq!(stored.payload["key"], "value");
    assert_eq!(stored.schema_v, 1);
}

#[tokio::test]
async fn repeated_facts_for_same_stream_and_actor_are_all_kept() {
    let Some(store) = test_store().await else {
        return;
    };
    let question = Uuid::new_v4();
    let user = Uuid::new_v4();

    for probability in [30, 45, 60] {
        store
            .append_and_read(
                AppendEvent::new("prediction_submitted", json!({ "probability": probability }))
                    .with_stream(question)
                    .with_actor(user),
            )
            .await
            .unwrap();
    }

    let events = store.read_by_stream(question).await.unwrap();
    assert_eq!(events.len(), 3);
    let probs: Vec<i64> = events
        .iter()
        .map(|e| e.payload["probability"].as_i64().unwrap())
        .collect();
    assert_eq!(probs, vec![30, 45, 60]);
    assert!(events.iter().all(|e| e.actor == Some(user)));
}

#[tokio::test]
async fn read_from_returns_events_in_order() {
    let Some(store) = test_store().await else {
        return;
    };

    for name in ["event_a", "event_b", "event_c"] {
        store
            .append_and_read(AppendEvent::new(name, json!({})))
            .await
            .unwrap();
    }

    let events = store.read_from(1, 100).await.unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].event_type, "event_a");
    assert_eq!(events[1].event_type, "event_b");
    assert_eq!(events[2].event_type, "event_c");
    assert!(events[0].seq < events[1].seq);
    assert!(events[1].seq < events[2].seq);

    let tail = store.read_from(events[1].seq, 100).await.unwrap();
    assert_eq!(tail.len(), 2);
}

#[tokio::test]
async fn child_event_sets_parent_and_caused_by() {
    let Some(store) = test_store().await else {
        return;
    };

    let root = store
        .append_and_read(AppendEvent::new("suggestion_reviewed", json!({"approved": true})))
        .await
        .unwrap();
    let child = store
        .append_child_and_read(root.seq, AppendEvent::new("question_published", json!({})))
        .await
        .unwrap();
    let grandchild = store
        .append_child_and_read(child.seq, AppendEvent::new("grandchild", json!({})))
        .await
        .unwrap();

    assert_eq!(child.parent_seq, Some(root.seq));
    assert_eq!(child.caused_by_seq, Some(root.seq));
    assert_eq!(grandchild.parent_seq, Some(child.seq));
    assert_eq!(grandchild.caused_by_seq, Some(root.seq));

    let all = store.read_from(root.seq, 10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all[0].caused_by_seq.is_none());
}

#[tokio::test]
async fn child_of_missing_parent_is_rejected() {
    let Some(store) = test_store().await else {
        return;
    };

    let result = store
        .append_child_and_read(9_999, AppendEvent::new("orphan", json!({})))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn latest_seq_tracks_appends() {
    let Some(store) = test_store().await else {
        return;
    };

    assert_eq!(store.latest_seq().await.unwrap(), 0);

    store
        .append_and_read(AppendEvent::new("a", json!({})))
        .await
        .unwrap();
    let second = store
        .append_and_read(AppendEvent::new("b", json!({})))
        .await
        .unwrap();

    assert_eq!(store.latest_seq().await.unwrap(), second.seq);
    assert_eq!(store.read_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn aborted_insert_leaves_a_hole_visible_through_peek() {
    let Some(store) = test_store().await else {
        return;
    };
    let url = std::env::var("DATABASE_TEST_URL").unwrap();
    let pool = PgPool::connect(&url).await.unwrap();

    let first = store
        .append_and_read(AppendEvent::new("a", json!({})))
        .await
        .unwrap();

    // Takes the next sequence value, then rolls back: the value is gone for good.
    let mut tx = pool.begin().await.unwrap();
    sqlx::query("INSERT INTO events (event_type, payload) VALUES ('lost', '{}'::jsonb)")
        .execute(&mut *tx)
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    let after = store
        .append_and_read(AppendEvent::new("b", json!({})))
        .await
        .unwrap();
    assert_eq!(after.seq, first.seq + 2);

    let readable = store.read_from(first.seq, 100).await.unwrap();
    assert_eq!(readable.len(), 1);

    assert_eq!(store.latest_seq().await.unwrap(), after.seq);
    let beyond = store.peek_from(first.seq + 1).await.unwrap().unwrap();
    assert_eq!(beyond.seq, after.seq);
    assert_eq!(beyond.event_type, "b");
    assert!(store.peek_from(after.seq + 1).await.unwrap().is_none());
}
