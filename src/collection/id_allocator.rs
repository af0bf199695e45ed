use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use crate::error::MotionResult;
use crate::models::SessionId;
use crate::storage::LastIdStore;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2000);

enum LastId {
    Pending(JoinHandle<MotionResult<SessionId>>),
    Resolved(SessionId),
}

/// Hands out session ids one above the last persisted id.
///
/// The persisted value is read in the background as soon as the allocator is
/// built. `allocate` waits for that read at most `read_timeout`; after that it
/// gives up on it and numbers from zero. Each new id is written back without
/// waiting for the write.
///
/// Known gap: when the read is slower than the timeout, numbering restarts at
/// 1 even if stored sessions already use those ids.
pub struct SessionIdAllocator {
    store: Arc<dyn LastIdStore>,
    last: Mutex<LastId>,
    read_timeout: Duration,
    current_tx: watch::Sender<Option<SessionId>>,
}

impl SessionIdAllocator {
    /// Starts the background read. Must be called inside a tokio runtime.
    pub fn new(store: Arc<dyn LastIdStore>, read_timeout: Duration) -> Self {
        let reader = store.clone();
        let read = tokio::spawn(async move { reader.load_last_id().await });
        let (current_tx, _rx) = watch::channel(None);

        Self {
            store,
            last: Mutex::new(LastId::Pending(read)),
            read_timeout,
            current_tx,
        }
    }

    pub async fn allocate(&self) -> SessionId {
        let mut last = self.last.lock().await;

        let previous = match &mut *last {
            LastId::Resolved(id) => *id,
            LastId::Pending(read) => match time::timeout(self.read_timeout, &mut *read).await {
                Ok(Ok(Ok(id))) => id,
                Ok(Ok(Err(err))) => {
                    warn!("Failed to read last session id, numbering from 0: {err}");
                    0
                }
                Ok(Err(join_err)) => {
                    warn!("Last session id read task failed, numbering from 0: {join_err}");
                    0
                }
                Err(_) => {
                    read.abort();
                    warn!(
                        "Last session id not read within {} ms, numbering from 0",
                        self.read_timeout.as_millis()
                    );
                    0
                }
            },
        };

        let id = previous.saturating_add(1);
        *last = LastId::Resolved(id);
        drop(last);

        self.current_tx.send_replace(Some(id));
        info!("Allocated session id {id}");

        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(err) = store.save_last_id(id).await {
                warn!("Failed to persist last session id {id}: {err}");
            }
        });

        id
    }

    /// Most recently allocated id, `None` before the first allocation.
    pub fn current(&self) -> Option<SessionId> {
        *self.current_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SessionId>> {
        self.current_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::testing::MemoryIdStore;

    #[tokio::test(start_paused = true)]
    async fn test_sequential_ids_are_unique() {
        let store = Arc::new(MemoryIdStore::new(5));
        let allocator = SessionIdAllocator::new(store.clone(), DEFAULT_READ_TIMEOUT);
        let mut feed = allocator.subscribe();
        assert_eq!(*feed.borrow_and_update(), None);

        let ids = [
            allocator.allocate().await,
            allocator.allocate().await,
            allocator.allocate().await,
        ];
        assert_eq!(ids, [6, 7, 8]);
        assert_eq!(allocator.current(), Some(8));
        assert!(feed.has_changed().unwrap());

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.last(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_read_degrades_to_zero() {
        let store = Arc::new(MemoryIdStore::new(5).with_load_delay(Duration::from_secs(5)));
        let allocator = SessionIdAllocator::new(store.clone(), DEFAULT_READ_TIMEOUT);

        let started = time::Instant::now();
        let first = allocator.allocate().await;
        let waited = started.elapsed();

        // Stored ids 1..=5 already exist, yet numbering restarts: the known gap.
        assert_eq!(first, 1);
        assert!(waited >= DEFAULT_READ_TIMEOUT && waited < Duration::from_secs(5));
        assert_eq!(allocator.allocate().await, 2);

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.last(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_within_timeout_is_used() {
        let store = Arc::new(MemoryIdStore::new(41).with_load_delay(Duration::from_millis(1500)));
        let allocator = SessionIdAllocator::new(store, DEFAULT_READ_TIMEOUT);
        assert_eq!(allocator.allocate().await, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failures_are_swallowed() {
        let store = Arc::new(MemoryIdStore::new(9).failing());
        let allocator = SessionIdAllocator::new(store.clone(), DEFAULT_READ_TIMEOUT);

        assert_eq!(allocator.allocate().await, 1);
        assert_eq!(allocator.allocate().await, 2);

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.last(), 9);
        assert_eq!(store.save_attempts(), 2);
    }
}
