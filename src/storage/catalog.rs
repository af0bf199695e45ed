use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::MotionResult;
use crate::models::{SessionId, SessionInfo};

use super::store::SessionStore;

/// Observable in-memory list of saved sessions.
#[derive(Clone)]
pub struct SessionCatalog {
    tx: Arc<watch::Sender<Vec<SessionInfo>>>,
}

impl Default for SessionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCatalog {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<SessionInfo>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Vec<SessionInfo> {
        self.tx.borrow().clone()
    }

    pub fn get(&self, id: SessionId) -> Option<SessionInfo> {
        self.tx.borrow().iter().find(|info| info.id == id).copied()
    }

    pub fn add(&self, info: SessionInfo) {
        self.tx.send_modify(|list| list.push(info));
    }

    /// Appends every entry whose id is not already listed. Within the batch
    /// the first occurrence of an id wins.
    pub fn add_all(&self, infos: impl IntoIterator<Item = SessionInfo>) {
        self.tx.send_modify(|list| {
            let mut seen: HashSet<SessionId> = list.iter().map(|info| info.id).collect();
            list.extend(infos.into_iter().filter(|info| seen.insert(info.id)));
        });
    }

    pub fn remove(&self, id: SessionId) -> bool {
        self.tx.send_if_modified(|list| {
            let before = list.len();
            list.retain(|info| info.id != id);
            list.len() != before
        })
    }

    pub fn clear(&self) {
        self.tx.send_replace(Vec::new());
    }

    /// Replaces the contents with what the store currently holds.
    pub async fn reload(&self, store: &SessionStore) -> MotionResult<usize> {
        let infos = store.list().await?;
        self.clear();
        self.add_all(infos);
        Ok(self.tx.borrow().len())
    }
}
