//! In-memory stand-ins for the storage traits.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::{self, Duration};

use crate::error::{MotionError, MotionResult};
use crate::models::{CollectingSession, SessionId};
use crate::storage::{LastIdStore, SessionSink};

fn disk_full() -> MotionError {
    MotionError::storage("simulated", io::Error::new(io::ErrorKind::Other, "disk full"))
}

pub struct MemoryIdStore {
    last: AtomicU32,
    load_delay: Duration,
    fail: bool,
    saves: AtomicUsize,
}

impl MemoryIdStore {
    pub fn new(last: SessionId) -> Self {
        Self {
            last: AtomicU32::new(last),
            load_delay: Duration::ZERO,
            fail: false,
            saves: AtomicUsize::new(0),
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn last(&self) -> SessionId {
        self.last.load(Ordering::SeqCst)
    }

    pub fn save_attempts(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LastIdStore for MemoryIdStore {
    async fn load_last_id(&self) -> MotionResult<SessionId> {
        if !self.load_delay.is_zero() {
            time::sleep(self.load_delay).await;
        }
        if self.fail {
            return Err(disk_full());
        }
        Ok(self.last())
    }

    async fn save_last_id(&self, id: SessionId) -> MotionResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(disk_full());
        }
        self.last.store(id, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    saved: Mutex<Vec<CollectingSession>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<CollectingSession> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionSink for RecordingSink {
    async fn save_session(&self, session: CollectingSession) -> MotionResult<PathBuf> {
        let path = PathBuf::from(format!("memory/{}", session.id()));
        self.saved.lock().unwrap().push(session);
        if self.fail {
            return Err(disk_full());
        }
        Ok(path)
    }
}
