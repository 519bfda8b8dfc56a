//! Job Queue: FIFO of match ids between the submission surface and the worker.
//!
//! `pop` returns `Ok(None)` once the queue has been closed; that is the
//! worker's shutdown signal. Neither backend deduplicates: pushing the same id
//! twice gets it processed twice.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Seconds a Redis `BLPOP` waits before re-checking for shutdown.
const REDIS_POLL_SECS: u64 = 1;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Appends a match id to the tail.
    async fn push(&self, match_id: Uuid) -> Result<(), QueueError>;

    /// Waits for the next match id. `Ok(None)` means the queue was closed.
    async fn pop(&self) -> Result<Option<Uuid>, QueueError>;

    /// Signals shutdown: pending and future `pop` calls return `Ok(None)`.
    fn close(&self);

    /// Resolves once `close` has been called.
    async fn until_closed(&self);
}

async fn wait_closed(flag: &watch::Sender<bool>) {
    let mut rx = flag.subscribe();
    while !*rx.borrow_and_update() {
        // The sender lives in the queue, so `changed` only fails if it is gone.
        if rx.changed().await.is_err() {
            break;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-process queue
// ────────────────────────────────────────────────────────────────────────────

/// Unbounded in-process channel. Contents are lost on restart, and anything
/// still buffered when the queue is closed is discarded.
pub struct MemoryQueue {
    tx: mpsc::UnboundedSender<Uuid>,
    rx: Mutex<mpsc::UnboundedReceiver<Uuid>>,
    closed: watch::Sender<bool>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Self {
            tx,
            rx: Mutex::new(rx),
            closed,
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn push(&self, match_id: Uuid) -> Result<(), QueueError> {
        if *self.closed.borrow() {
            return Err(QueueError::Closed);
        }
        self.tx.send(match_id).map_err(|_| QueueError::Closed)
    }

    async fn pop(&self) -> Result<Option<Uuid>, QueueError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }

        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = closed.changed() => Ok(None),
            item = rx.recv() => Ok(item),
        }
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }

    async fn until_closed(&self) {
        wait_closed(&self.closed).await;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis list queue
// ────────────────────────────────────────────────────────────────────────────

/// Redis list used as a FIFO (`RPUSH` at the tail, `BLPOP` from the head).
/// Survives process restarts and can be shared by several workers, since
/// `BLPOP` hands each entry to exactly one consumer.
pub struct RedisQueue {
    client: redis::Client,
    key: String,
    closed: watch::Sender<bool>,
}

impl RedisQueue {
    pub fn new(client: redis::Client, key: impl Into<String>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            client,
            key: key.into(),
            closed,
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, QueueError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push(&self, match_id: Uuid) -> Result<(), QueueError> {
        if *self.closed.borrow() {
            return Err(QueueError::Closed);
        }
        let mut conn = self.connection().await?;
        redis::cmd("RPUSH")
            .arg(&self.key)
            .arg(match_id.to_string())
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Each `BLPOP` runs to completion (at most `REDIS_POLL_SECS`) instead of
    /// being cancelled on close, so an entry the server already handed out is
    /// never dropped; one popped after `close` goes back to the head.
    async fn pop(&self) -> Result<Option<Uuid>, QueueError> {
        if *self.closed.borrow() {
            return Ok(None);
        }
        // Blocking pops get a dedicated connection so they never stall pushes.
        let mut conn = tokio::select! {
            biased;
            _ = wait_closed(&self.closed) => return Ok(None),
            conn = self.connection() => conn?,
        };
        let mut blpop = redis::cmd("BLPOP");
        blpop.arg(&self.key).arg(REDIS_POLL_SECS);

        loop {
            if *self.closed.borrow() {
                return Ok(None);
            }

            let popped: Option<(String, String)> = blpop.query_async(&mut conn).await?;
            let Some((_, raw)) = popped else {
                continue;
            };

            if *self.closed.borrow() {
                redis::cmd("LPUSH")
                    .arg(&self.key)
                    .arg(&raw)
                    .query_async::<_, ()>(&mut conn)
                    .await?;
                debug!(entry = %raw, "Returned entry to the queue on shutdown");
                return Ok(None);
            }

            match raw.parse::<Uuid>() {
                Ok(id) => {
                    debug!(match_id = %id, "Dequeued match from redis");
                    return Ok(Some(id));
                }
                Err(e) => warn!(entry = %raw, error = %e, "Skipping malformed queue entry"),
            }
        }
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }

    async fn until_closed(&self) {
        wait_closed(&self.closed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_queue_is_fifo() {
        let queue = MemoryQueue::new();
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            queue.push(*id).await.unwrap();
        }
        for id in &ids {
            assert_eq!(queue.pop().await.unwrap(), Some(*id));
        }
    }

    #[tokio::test]
    async fn test_memory_queue_does_not_deduplicate() {
        let queue = MemoryQueue::new();
        let id = Uuid::new_v4();
        queue.push(id).await.unwrap();
        queue.push(id).await.unwrap();
        assert_eq!(queue.pop().await.unwrap(), Some(id));
        assert_eq!(queue.pop().await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_pop() {
        let queue = Arc::new(MemoryQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("pop should return after close")
            .unwrap()
            .unwrap();
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn test_closed_queue_discards_buffer_and_rejects_push() {
        let queue = MemoryQueue::new();
        queue.push(Uuid::new_v4()).await.unwrap();
        queue.close();

        assert_eq!(queue.pop().await.unwrap(), None);
        assert!(matches!(
            queue.push(Uuid::new_v4()).await,
            Err(QueueError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_redis_queue_pop_after_close_needs_no_server() {
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let queue = RedisQueue::new(client, "test:matches");
        queue.close();
        let popped = tokio::time::timeout(Duration::from_secs(1), queue.pop())
            .await
            .expect("pop should not wait on an unreachable server");
        assert_eq!(popped.unwrap(), None);
    }

    #[tokio::test]
    async fn test_until_closed_resolves_after_close() {
        let queue = Arc::new(MemoryQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.until_closed().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        queue.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("until_closed should resolve")
            .unwrap();
    }

    /// Needs a live server; skipped unless `REDIS_TEST_URL` is set.
    #[tokio::test]
    async fn test_redis_queue_keeps_entries_on_shutdown() {
        let Ok(url) = std::env::var("REDIS_TEST_URL") else {
            return;
        };
        let client = redis::Client::open(url.as_str()).unwrap();
        let key = format!("test:matches:{}", Uuid::new_v4());
        let queue = RedisQueue::new(client.clone(), key.clone());

        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        queue.push(first).await.unwrap();
        queue.push(second).await.unwrap();
        assert_eq!(queue.pop().await.unwrap(), Some(first));

        queue.close();
        assert_eq!(queue.pop().await.unwrap(), None);

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let left: Vec<String> = redis::cmd("LRANGE")
            .arg(&key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .unwrap();
        assert_eq!(left, vec![second.to_string()]);
        redis::cmd("DEL")
            .arg(&key)
            .query_async::<_, ()>(&mut conn)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_redis_queue_rejects_push_after_close() {
        // No server needed: the closed check happens before connecting.
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let queue = RedisQueue::new(client, "test:matches");
        queue.close();
        assert!(matches!(
            queue.push(Uuid::new_v4()).await,
            Err(QueueError::Closed)
        ));
    }
}
