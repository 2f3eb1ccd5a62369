use std::sync::Arc;
use std::time::Duration;

use jobq::{CounterField, Job, Queue, RedisStore, Store, Worker, WorkerOptions};
use secrecy::SecretString;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Helper: connect for tests.
/// Requires REDIS_URL env var or defaults to local dev.
async fn test_store() -> Arc<dyn Store> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".to_string());
    let store = RedisStore::connect(&SecretString::from(url)).await.unwrap();
    store.health_check().await.unwrap();
    Arc::new(store)
}

/// A queue name no other test run will collide with.
fn unique_queue(prefix: &str) -> String {
    format!("jobq-test-{prefix}-{}", jobq::JobId::new())
}

async fn cleanup(queue: &Queue, store: &Arc<dyn Store>) {
    let keys = jobq::store::Keys::new(queue.name());
    store
        .delete(&[&keys.queue, &keys.dropped, &keys.count, &keys.active].map(String::as_str))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn publish_and_fetch_round_trip() {
    let store = test_store().await;
    let queue = Queue::new(unique_queue("fifo"), Arc::clone(&store));

    let first = queue.publish(&json!({"n": 1})).await.unwrap();
    let second = queue.publish(&json!({"n": 2})).await.unwrap();
    assert_eq!(queue.pending().await.unwrap(), 2);

    assert_eq!(queue.fetch().await.unwrap().id, first);
    assert_eq!(queue.fetch().await.unwrap().id, second);
    assert!(queue.fetch().await.unwrap_err().is_empty_queue());

    cleanup(&queue, &store).await;
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn counters_increment_atomically_and_reset() {
    let store = test_store().await;
    let queue = Queue::new(unique_queue("status"), Arc::clone(&store));
    let counter = queue.counter();
    let ttl = Duration::from_secs(60);

    counter.increment(CounterField::Processing, ttl).await.unwrap();
    counter.increment(CounterField::Succeeded, ttl).await.unwrap();

    let status = counter.snapshot().await.unwrap();
    assert!(status.is_running);
    assert_eq!(status.processing, 1);
    assert_eq!(status.succeeded, 1);
    assert_eq!(status.total, 1);

    counter.reset().await.unwrap();
    assert!(!counter.snapshot().await.unwrap().is_running);

    cleanup(&queue, &store).await;
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn worker_processes_and_drops() {
    let store = test_store().await;
    let queue = Queue::new(unique_queue("worker"), Arc::clone(&store));

    queue.publish(&json!({"ok": true})).await.unwrap();
    queue.publish(&json!({"ok": false})).await.unwrap();

    let handler = |job: Job| async move {
        let value: serde_json::Value = job.payload()?;
        if value["ok"] == json!(true) {
            Ok(())
        } else {
            Err(anyhow::anyhow!("rejected"))
        }
    };
    let options = WorkerOptions::default()
        .max_retry(0)
        .safe_drop(true)
        .interval(Duration::from_millis(50));
    let worker = Worker::new(queue.clone(), handler, options).unwrap();

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle = tokio::spawn(async move { worker.run(token).await });

    for _ in 0..100 {
        let status = queue.status().await.unwrap();
        if status.succeeded == 1 && status.dropped == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cancel.cancel();
    handle.await.unwrap();

    let status = queue.status().await.unwrap();
    assert_eq!(status.succeeded, 1);
    assert_eq!(status.dropped, 1);
    assert_eq!(queue.dropped_len().await.unwrap(), 1);

    cleanup(&queue, &store).await;
}
