//! # Write Coalescer
//!
//! Debounces rapid edits so a record is written once the user stops typing.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Write Coalescer                                  │
//! │                                                                         │
//! │  editor ──stage(owner, record)──▶ ┌──────────────────────────┐          │
//! │  editor ──stage(owner, record)──▶ │  Pending writes          │          │
//! │                                   │  (owner, id) → record    │          │
//! │                                   │  last write wins         │          │
//! │                                   └────────────┬─────────────┘          │
//! │                                                │                        │
//! │                     tick: entry idle ≥ window  │  flush() / shutdown()  │
//! │                                                ▼                        │
//! │                                   RecordStore::upsert(owner, record)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Staging a record whose `(owner, id)` is already pending replaces the
//! pending copy and restarts its idle timer. A write the store rejects is
//! logged and dropped. Records staged before the shutdown command is
//! handled are still written.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{DbError, DbResult};
use crate::store::RecordStore;
use costbook_core::Record;

// =============================================================================
// Constants
// =============================================================================

/// Default idle window in milliseconds.
pub const DEFAULT_COALESCE_WINDOW_MS: u64 = 400;

/// Pending writes before a forced flush.
const MAX_PENDING_WRITES: usize = 1000;

/// A staged record waiting for its idle window to pass.
#[derive(Debug)]
struct PendingWrite<T> {
    owner_id: String,
    record: T,
    last_seen: Instant,
}

/// Commands for the coalescer task.
enum CoalescerCommand<T> {
    Stage { owner_id: String, record: T },
    Flush { ack: oneshot::Sender<usize> },
    Shutdown { ack: oneshot::Sender<usize> },
}

// =============================================================================
// Handle
// =============================================================================

/// Handle for feeding and controlling a running coalescer.
pub struct CoalescerHandle<T> {
    cmd_tx: mpsc::Sender<CoalescerCommand<T>>,
}

impl<T> Clone for CoalescerHandle<T> {
    fn clone(&self) -> Self {
        CoalescerHandle {
            cmd_tx: self.cmd_tx.clone(),
        }
    }
}

fn closed() -> DbError {
    DbError::ChannelClosed("Write coalescer channel closed".into())
}

impl<T: Record> CoalescerHandle<T> {
    /// Stages a record for a debounced upsert.
    pub async fn stage(&self, owner_id: impl Into<String>, record: T) -> DbResult<()> {
        self.cmd_tx
            .send(CoalescerCommand::Stage {
                owner_id: owner_id.into(),
                record,
            })
            .await
            .map_err(|_| closed())
    }

    /// Writes everything pending now. Returns the number of records written.
    pub async fn flush(&self) -> DbResult<usize> {
        let (ack, done) = oneshot::channel();
        self.cmd_tx
            .send(CoalescerCommand::Flush { ack })
            .await
            .map_err(|_| closed())?;
        done.await.map_err(|_| closed())
    }

    /// Writes everything pending and stops the task.
    pub async fn shutdown(&self) -> DbResult<usize> {
        let (ack, done) = oneshot::channel();
        self.cmd_tx
            .send(CoalescerCommand::Shutdown { ack })
            .await
            .map_err(|_| closed())?;
        done.await.map_err(|_| closed())
    }
}

// =============================================================================
// Coalescer
// =============================================================================

/// Debounced writer in front of a [`RecordStore`].
///
/// ## Usage
/// ```rust,ignore
/// let handle = WriteCoalescer::new(db.cost_sheets(), config.coalesce_window()).start();
/// handle.stage(owner, sheet.clone()).await?;   // many times while editing
/// handle.shutdown().await?;                    // on exit
/// ```
pub struct WriteCoalescer<T, S> {
    store: S,
    window: Duration,
    pending: HashMap<(String, String), PendingWrite<T>>,
    _record: PhantomData<fn() -> T>,
}

impl<T, S> WriteCoalescer<T, S>
where
    T: Record,
    S: RecordStore<T> + 'static,
{
    /// Creates a coalescer writing to `store` after `window` of inactivity.
    pub fn new(store: S, window: Duration) -> Self {
        WriteCoalescer {
            store,
            window: window.max(Duration::from_millis(1)),
            pending: HashMap::new(),
            _record: PhantomData,
        }
    }

    /// Starts the coalescer task and returns a handle.
    pub fn start(self) -> CoalescerHandle<T> {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);

        tokio::spawn(async move {
            self.run(cmd_rx).await;
        });

        CoalescerHandle { cmd_tx }
    }

    /// Main loop.
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<CoalescerCommand<T>>) {
        info!(
            collection = T::COLLECTION,
            window_ms = self.window.as_millis() as u64,
            "Write coalescer started"
        );

        // tick often enough that an idle entry waits at most ~1.25 windows
        let mut ticker = interval((self.window / 4).max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(CoalescerCommand::Stage { owner_id, record }) => {
                            self.stage(owner_id, record).await;
                        }
                        Some(CoalescerCommand::Flush { ack }) => {
                            let written = self.flush_where(|_| true).await;
                            let _ = ack.send(written);
                        }
                        Some(CoalescerCommand::Shutdown { ack }) => {
                            cmd_rx.close();
                            let mut acks = vec![ack];
                            let drained = self.drain(&mut cmd_rx, &mut acks).await;
                            let written = self.flush_where(|_| true).await;
                            info!(collection = T::COLLECTION, written, drained, "Write coalescer shutting down");
                            for ack in acks {
                                let _ = ack.send(written);
                            }
                            break;
                        }
                        None => {
                            // every handle dropped
                            self.flush_where(|_| true).await;
                            info!(collection = T::COLLECTION, "Write coalescer stopped");
                            break;
                        }
                    }
                }
                _ = ticker.tick(), if !self.pending.is_empty() => {
                    let now = Instant::now();
                    let window = self.window;
                    self.flush_where(|write| now.duration_since(write.last_seen) >= window).await;
                }
            }
        }
    }

    /// Stages whatever was queued behind a shutdown. Flush and shutdown
    /// requests found there are answered with the final flush count.
    async fn drain(
        &mut self,
        cmd_rx: &mut mpsc::Receiver<CoalescerCommand<T>>,
        acks: &mut Vec<oneshot::Sender<usize>>,
    ) -> usize {
        let mut drained = 0;
        while let Ok(cmd) = cmd_rx.try_recv() {
            match cmd {
                CoalescerCommand::Stage { owner_id, record } => {
                    self.stage(owner_id, record).await;
                    drained += 1;
                }
                CoalescerCommand::Flush { ack } | CoalescerCommand::Shutdown { ack } => acks.push(ack),
            }
        }
        drained
    }

    /// Adds or replaces a pending write.
    async fn stage(&mut self, owner_id: String, record: T) {
        let key = (owner_id.clone(), record.id().to_string());
        let replaced = self
            .pending
            .insert(
                key,
                PendingWrite {
                    owner_id,
                    record,
                    last_seen: Instant::now(),
                },
            )
            .is_some();

        debug!(collection = T::COLLECTION, replaced, pending = self.pending.len(), "Staged write");

        if self.pending.len() >= MAX_PENDING_WRITES {
            warn!(count = self.pending.len(), "Too many pending writes - forcing flush");
            self.flush_where(|_| true).await;
        }
    }

    /// Upserts and removes every pending write matching `ready`.
    async fn flush_where(&mut self, ready: impl Fn(&PendingWrite<T>) -> bool) -> usize {
        let keys: Vec<(String, String)> = self
            .pending
            .iter()
            .filter(|(_, write)| ready(*write))
            .map(|(key, _)| key.clone())
            .collect();

        if keys.is_empty() {
            return 0;
        }

        debug!(collection = T::COLLECTION, count = keys.len(), "Flushing pending writes");

        let mut written = 0;
        for key in keys {
            let Some(write) = self.pending.remove(&key) else {
                continue;
            };

            match self.store.upsert(&write.owner_id, &write.record).await {
                Ok(_) => written += 1,
                Err(e) => error!(
                    collection = T::COLLECTION,
                    id = %write.record.id(),
                    error = %e,
                    "Dropping write rejected by the store"
                ),
            }
        }

        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalStore, GUEST_OWNER_ID};
    use costbook_core::MaterialRecord;

    async fn stored(store: &LocalStore, id: &str) -> Option<MaterialRecord> {
        RecordStore::<MaterialRecord>::get(store, GUEST_OWNER_ID, id).await.unwrap()
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = LocalStore::in_memory();
        let handle = WriteCoalescer::new(store.clone(), Duration::from_secs(60)).start();

        let mut wax = MaterialRecord::new("Wax", "kg", 100);
        for cost in [100, 200, 300] {
            wax.unit_cost_cents = cost;
            handle.stage(GUEST_OWNER_ID, wax.clone()).await.unwrap();
        }

        assert!(stored(&store, &wax.id).await.is_none());
        assert_eq!(handle.flush().await.unwrap(), 1);
        assert_eq!(stored(&store, &wax.id).await.unwrap().unit_cost_cents, 300);
    }

    #[tokio::test]
    async fn test_idle_entries_flush_after_window() {
        let store = LocalStore::in_memory();
        let handle = WriteCoalescer::new(store.clone(), Duration::from_millis(20)).start();

        let wick = MaterialRecord::new("Wick", "pcs", 12);
        handle.stage(GUEST_OWNER_ID, wick.clone()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(stored(&store, &wick.id).await.unwrap().unit_cost_cents, 12);
        assert_eq!(handle.flush().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_distinct_records_are_kept_apart() {
        let store = LocalStore::in_memory();
        let handle = WriteCoalescer::new(store.clone(), Duration::from_secs(60)).start();

        handle.stage(GUEST_OWNER_ID, MaterialRecord::new("A", "pcs", 1)).await.unwrap();
        handle.stage(GUEST_OWNER_ID, MaterialRecord::new("B", "pcs", 2)).await.unwrap();

        assert_eq!(handle.shutdown().await.unwrap(), 2);
        let all = RecordStore::<MaterialRecord>::list(&store, GUEST_OWNER_ID).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_handle_fails_after_shutdown() {
        let store = LocalStore::in_memory();
        let handle = WriteCoalescer::<MaterialRecord, _>::new(store, Duration::from_secs(1)).start();

        assert_eq!(handle.shutdown().await.unwrap(), 0);
        assert!(matches!(
            handle.stage(GUEST_OWNER_ID, MaterialRecord::new("C", "pcs", 3)).await,
            Err(DbError::ChannelClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_writes_queued_behind_shutdown_are_kept() {
        let store = LocalStore::in_memory();
        let handle = WriteCoalescer::new(store.clone(), Duration::from_secs(60)).start();

        // Both commands are queued before the task first runs
        let (ack, done) = oneshot::channel();
        assert!(handle.cmd_tx.send(CoalescerCommand::Shutdown { ack }).await.is_ok());
        let wick = MaterialRecord::new("Wick", "pcs", 12);
        handle.stage(GUEST_OWNER_ID, wick.clone()).await.unwrap();

        assert_eq!(done.await.unwrap(), 1);
        assert_eq!(stored(&store, &wick.id).await.unwrap().unit_cost_cents, 12);
    }

    #[tokio::test]
    async fn test_rejected_write_is_dropped() {
        let db = crate::pool::Database::new(crate::pool::DbConfig::in_memory()).await.unwrap();
        let handle = WriteCoalescer::new(db.materials(), Duration::from_secs(60)).start();

        handle.stage("owner-1", MaterialRecord::new("", "pcs", 1)).await.unwrap();
        handle.stage("owner-1", MaterialRecord::new("Valid", "pcs", 1)).await.unwrap();

        assert_eq!(handle.flush().await.unwrap(), 1);
        assert_eq!(db.materials().count("owner-1").await.unwrap(), 1);
    }
}
