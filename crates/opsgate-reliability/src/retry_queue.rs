// crates/opsgate-reliability/src/retry_queue.rs
// ============================================================================
// Module: Retry Queue (L3)
// Description: Durable, best-effort re-execution of failed side-effectful
//              operations with a fixed backoff schedule.
// Purpose: Give adapters a place to park operations that failed (e.g.
//          "mark email read") so they get retried without blocking the
//          caller.
// Dependencies: opsgate-core, opsgate-reliability::persistence, serde,
//               serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! `enqueue` appends an operation to memory and to an on-disk JSON array.
//! A scheduler, run via [`RetryQueue::run_due`], walks items whose
//! `next_attempt_at <= now`, invokes the registered handler for the
//! operation's type, and on failure reschedules with the fixed delay
//! schedule `[60s, 5m, 15m, 1h, 6h]`; once that schedule is exhausted the
//! item is removed and a terminal record is appended to the
//! failed-operations log. A run cannot overlap itself.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opsgate_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;
use tracing::warn;

use crate::persistence::load_snapshot;
use crate::persistence::write_snapshot;
use crate::persistence::PersistenceError;

/// The fixed backoff schedule a retry item advances through.
pub const BACKOFF_SCHEDULE: [Duration; 5] = [
    Duration::from_secs(60),
    Duration::from_secs(5 * 60),
    Duration::from_secs(15 * 60),
    Duration::from_secs(60 * 60),
    Duration::from_secs(6 * 60 * 60),
];

/// A handler for one operation type.
#[async_trait]
pub trait RetryHandler: Send + Sync {
    /// Attempts the operation described by `params`.
    async fn handle(&self, params: &Value) -> Result<(), String>;
}

/// One durable retry item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryItem {
    /// Identifier assigned at enqueue time.
    pub id: String,
    /// The registered operation type, looked up in the handler table.
    pub op_type: String,
    /// Operation parameters, opaque to the queue itself.
    pub params: Value,
    /// Attempts made so far.
    pub attempts: u32,
    /// When the next attempt is eligible to run.
    pub next_attempt_at: Timestamp,
    /// When this item was first enqueued.
    pub created_at: Timestamp,
}

/// A terminal record for an item that exhausted the backoff schedule, or
/// had no registered handler at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedOperation {
    /// The item as it stood when it was abandoned.
    pub item: RetryItem,
    /// The last error observed, if any attempt ever ran.
    pub last_error: Option<String>,
    /// When the item was abandoned.
    pub abandoned_at: Timestamp,
}

#[derive(Default, Serialize, Deserialize)]
struct QueueFile {
    items: Vec<RetryItem>,
}

/// Durable retry queue for failed side-effectful operations.
pub struct RetryQueue {
    items: Mutex<Vec<RetryItem>>,
    handlers: Mutex<HashMap<String, Arc<dyn RetryHandler>>>,
    running: AtomicBool,
    store_path: PathBuf,
    failed_log_path: PathBuf,
}

impl RetryQueue {
    /// Builds an empty queue persisting to `store_path`, with terminal
    /// records appended to `failed_log_path`.
    #[must_use]
    pub fn new(store_path: PathBuf, failed_log_path: PathBuf) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            handlers: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            store_path,
            failed_log_path,
        }
    }

    /// Restores queued items from `store_path`, if a snapshot exists.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the snapshot exists but cannot be
    /// read or parsed.
    pub async fn load(&self) -> Result<(), PersistenceError> {
        if let Some(file) = load_snapshot::<QueueFile>(&self.store_path).await? {
            *self.items.lock().await = file.items;
        }
        Ok(())
    }

    /// Registers the handler for `op_type`, replacing any prior handler.
    pub async fn register_handler(&self, op_type: impl Into<String>, handler: Arc<dyn RetryHandler>) {
        self.handlers.lock().await.insert(op_type.into(), handler);
    }

    /// Appends a new operation to the queue, eligible to run immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the updated queue cannot be
    /// persisted; the item is still enqueued in memory regardless.
    pub async fn enqueue(
        &self,
        op_type: impl Into<String>,
        params: Value,
        now: Timestamp,
    ) -> Result<String, PersistenceError> {
        let id = format!("retry-{}", uuid::Uuid::new_v4());
        let item = RetryItem {
            id: id.clone(),
            op_type: op_type.into(),
            params,
            attempts: 0,
            next_attempt_at: now,
            created_at: now,
        };
        {
            let mut items = self.items.lock().await;
            items.push(item);
        }
        self.persist().await?;
        Ok(id)
    }

    /// Runs every item whose `next_attempt_at <= now`. A no-op if a run is
    /// already in progress, guarding against re-entrant scheduler ticks.
    pub async fn run_due(&self, now: Timestamp) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.run_due_inner(now).await;
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_due_inner(&self, now: Timestamp) {
        let due: Vec<RetryItem> = {
            let items = self.items.lock().await;
            items
                .iter()
                .filter(|item| now.is_at_or_after(item.next_attempt_at))
                .cloned()
                .collect()
        };

        for item in due {
            self.attempt_one(item, now).await;
        }

        if let Err(err) = self.persist().await {
            warn!("retry queue: failed to persist after run: {err}");
        }
    }

    async fn attempt_one(&self, mut item: RetryItem, now: Timestamp) {
        let handler = self.handlers.lock().await.get(&item.op_type).cloned();
        let Some(handler) = handler else {
            item.attempts += 1;
            self.reschedule_or_abandon(item, now, None).await;
            return;
        };

        match handler.handle(&item.params).await {
            Ok(()) => {
                info!(id = %item.id, op_type = %item.op_type, "retry succeeded");
                self.remove(&item.id).await;
            }
            Err(error) => {
                item.attempts += 1;
                self.reschedule_or_abandon(item, now, Some(error)).await;
            }
        }
    }

    async fn reschedule_or_abandon(&self, mut item: RetryItem, now: Timestamp, error: Option<String>) {
        let schedule_index = (item.attempts as usize).saturating_sub(1);
        if let Some(delay) = BACKOFF_SCHEDULE.get(schedule_index) {
            item.next_attempt_at = now.plus(*delay);
            let mut items = self.items.lock().await;
            if let Some(slot) = items.iter_mut().find(|existing| existing.id == item.id) {
                *slot = item;
            }
        } else {
            self.remove(&item.id).await;
            self.record_failure(item, error, now).await;
        }
    }

    async fn record_failure(&self, item: RetryItem, error: Option<String>, now: Timestamp) {
        let record = FailedOperation {
            item,
            last_error: error,
            abandoned_at: now,
        };
        match serde_json::to_string(&record) {
            Ok(line) => {
                if let Err(err) = append_line(&self.failed_log_path, &line).await {
                    warn!("retry queue: failed to append to failed-operations log: {err}");
                }
            }
            Err(err) => warn!("retry queue: failed to serialize failed operation: {err}"),
        }
    }

    async fn remove(&self, id: &str) {
        let mut items = self.items.lock().await;
        items.retain(|item| item.id != id);
    }

    async fn persist(&self) -> Result<(), PersistenceError> {
        let items = self.items.lock().await.clone();
        write_snapshot(&self.store_path, &QueueFile { items }).await
    }
}

async fn append_line(path: &std::path::Path, line: &str) -> Result<(), PersistenceError> {
    use tokio::io::AsyncWriteExt;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PersistenceError::Io {
                path: parent.display().to_string(),
                source,
            })?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| PersistenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
    file.write_all(line.as_bytes())
        .await
        .map_err(|source| PersistenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
    file.write_all(b"\n")
        .await
        .map_err(|source| PersistenceError::Io {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    struct AlwaysFails;

    #[async_trait]
    impl RetryHandler for AlwaysFails {
        async fn handle(&self, _params: &Value) -> Result<(), String> {
            Err("still broken".to_string())
        }
    }

    struct AlwaysSucceeds;

    #[async_trait]
    impl RetryHandler for AlwaysSucceeds {
        async fn handle(&self, _params: &Value) -> Result<(), String> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn successful_retry_removes_item() {
        let dir = tempdir().expect("tempdir");
        let queue = RetryQueue::new(dir.path().join("queue.json"), dir.path().join("failed.jsonl"));
        queue
            .register_handler("mark_read", Arc::new(AlwaysSucceeds))
            .await;
        queue
            .enqueue("mark_read", json!({}), Timestamp::from_unix_millis(0))
            .await
            .expect("enqueue");
        queue.run_due(Timestamp::from_unix_millis(0)).await;
        assert_eq!(queue.items.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn failing_retry_reschedules_with_backoff() {
        let dir = tempdir().expect("tempdir");
        let queue = RetryQueue::new(dir.path().join("queue.json"), dir.path().join("failed.jsonl"));
        queue
            .register_handler("mark_read", Arc::new(AlwaysFails))
            .await;
        queue
            .enqueue("mark_read", json!({}), Timestamp::from_unix_millis(0))
            .await
            .expect("enqueue");
        queue.run_due(Timestamp::from_unix_millis(0)).await;
        let items = queue.items.lock().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].attempts, 1);
        assert_eq!(items[0].next_attempt_at.unix_millis(), 60_000);
    }

    #[tokio::test]
    async fn exhausting_schedule_abandons_and_logs_terminal_entry() {
        let dir = tempdir().expect("tempdir");
        let failed_log = dir.path().join("failed.jsonl");
        let queue = RetryQueue::new(dir.path().join("queue.json"), failed_log.clone());
        queue
            .register_handler("mark_read", Arc::new(AlwaysFails))
            .await;
        queue
            .enqueue("mark_read", json!({}), Timestamp::from_unix_millis(0))
            .await
            .expect("enqueue");

        let mut now = Timestamp::from_unix_millis(0);
        for _ in 0..BACKOFF_SCHEDULE.len() {
            queue.run_due(now).await;
            now = now.plus(Duration::from_secs(6 * 60 * 60 + 1));
        }
        assert_eq!(queue.items.lock().await.len(), 0);
        let contents = tokio::fs::read_to_string(&failed_log).await.expect("read log");
        assert_eq!(contents.lines().count(), 1);
    }
}
