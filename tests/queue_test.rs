//! Integration tests for the queue client against the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use jobq::store::Keys;
use jobq::{Error, MemoryStore, Queue, Store};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Email {
    to: String,
    subject: String,
}

fn test_queue(name: &str) -> (Queue, MemoryStore) {
    let store = MemoryStore::new();
    (Queue::new(name, Arc::new(store.clone())), store)
}

// ---------------------------------------------------------------------------
// Publish / fetch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_then_fetch_returns_the_payload() {
    let (queue, _) = test_queue("emails");
    let email = Email {
        to: "user@example.com".to_string(),
        subject: "Welcome".to_string(),
    };

    let id = queue.publish(&email).await.unwrap();
    let job = queue.fetch().await.unwrap();

    assert_eq!(job.id, id);
    assert_eq!(job.retry_count, 0);
    assert_eq!(job.payload::<Email>().unwrap(), email);
}

#[tokio::test]
async fn fetch_is_fifo_and_destructive() {
    let (queue, _) = test_queue("jobs");
    let first = queue.publish(&1).await.unwrap();
    let second = queue.publish(&2).await.unwrap();
    assert_eq!(queue.pending().await.unwrap(), 2);

    assert_eq!(queue.fetch().await.unwrap().id, first);
    assert_eq!(queue.fetch().await.unwrap().id, second);
    assert_eq!(queue.pending().await.unwrap(), 0);
}

#[tokio::test]
async fn fetch_on_empty_queue_is_distinguishable() {
    let (queue, _) = test_queue("jobs");
    let err = queue.fetch().await.unwrap_err();
    assert!(err.is_empty_queue(), "expected EmptyQueue, got {err:?}");
}

#[tokio::test]
async fn publish_to_targets_another_queue() {
    let (queue, store) = test_queue("jobs");
    let other = Queue::new("reports", Arc::new(store.clone()));

    let id = queue.publish_to("reports", &json!({"month": 3})).await.unwrap();

    assert!(queue.fetch().await.unwrap_err().is_empty_queue());
    assert_eq!(other.fetch().await.unwrap().id, id);
}

#[tokio::test]
async fn unserializable_payload_is_an_encoding_error() {
    let (queue, store) = test_queue("jobs");
    let mut bad = HashMap::new();
    bad.insert((1, 2), "tuple keys are not valid JSON object keys");

    let err = queue.publish(&bad).await.unwrap_err();
    assert!(matches!(err, Error::Encoding(_)), "got {err:?}");
    assert_eq!(store.len(&Keys::new("jobs").queue).await.unwrap(), 0);
}

#[tokio::test]
async fn publish_surfaces_backend_errors() {
    let (queue, store) = test_queue("jobs");
    store.set_offline(true);
    let err = queue.publish(&1).await.unwrap_err();
    assert!(matches!(err, Error::Backend(_)), "got {err:?}");
}

#[tokio::test]
async fn corrupt_envelope_is_consumed_and_reported() {
    let (queue, store) = test_queue("jobs");
    store
        .push(&Keys::new("jobs").queue, b"{not json".to_vec())
        .await
        .unwrap();

    let err = queue.fetch().await.unwrap_err();
    assert!(matches!(err, Error::Decoding(_)), "got {err:?}");
    // The bytes do not come back.
    assert!(queue.fetch().await.unwrap_err().is_empty_queue());
}

// ---------------------------------------------------------------------------
// Requeue / dead list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn requeue_keeps_identity_and_retry_count() {
    let (queue, _) = test_queue("jobs");
    queue.publish("work").await.unwrap();

    let mut job = queue.fetch().await.unwrap();
    job.retry_count += 1;
    queue.requeue(&job).await.unwrap();

    let again = queue.fetch().await.unwrap();
    assert_eq!(again, job);
    assert_eq!(again.retry_count, 1);
}

#[tokio::test]
async fn dead_list_holds_discarded_jobs() {
    let (queue, _) = test_queue("jobs");
    queue.publish("doomed").await.unwrap();
    let job = queue.fetch().await.unwrap();

    queue.discard_to_dead_list(&job).await;

    assert_eq!(queue.dropped_len().await.unwrap(), 1);
    assert_eq!(queue.pending().await.unwrap(), 0);
    assert_eq!(queue.pop_dropped().await.unwrap(), Some(job));
    assert_eq!(queue.pop_dropped().await.unwrap(), None);
}

#[tokio::test]
async fn dead_list_failures_are_swallowed() {
    let (queue, store) = test_queue("jobs");
    queue.publish("doomed").await.unwrap();
    let job = queue.fetch().await.unwrap();

    store.set_offline(true);
    queue.discard_to_dead_list(&job).await;
    store.set_offline(false);

    assert_eq!(queue.dropped_len().await.unwrap(), 0);
}
