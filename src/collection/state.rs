use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::models::{SessionId, SessionInfo};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CollectionStatus {
    #[default]
    Idle,
    Collecting,
}

/// Live figures published by the statistics tick.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub elapsed_ms: u64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionState {
    pub status: CollectionStatus,
    pub session_id: Option<SessionId>,
    pub start_time_of_day: Option<u32>,
    pub started_at: Option<Instant>,
}

impl CollectionState {
    pub fn begin(&mut self, session_id: SessionId, start_time_of_day: u32, now: Instant) {
        *self = Self {
            status: CollectionStatus::Collecting,
            session_id: Some(session_id),
            start_time_of_day: Some(start_time_of_day),
            started_at: Some(now),
        };
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at
            .map(|anchor| anchor.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Returns the active session's id and start time and goes back to idle.
    pub fn finish(&mut self) -> Option<(SessionId, u32)> {
        let ended = match (self.status, self.session_id, self.start_time_of_day) {
            (CollectionStatus::Collecting, Some(id), Some(start)) => Some((id, start)),
            _ => None,
        };
        *self = Self::default();
        ended
    }
}

/// How the save that follows a stop ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum SaveOutcome {
    Saved { info: SessionInfo, path: PathBuf },
    /// No samples were collected, so nothing was written.
    Skipped,
    Failed { info: SessionInfo, message: String },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }
}

/// One-shot "save completed" signal for a single stop. Clones share the same
/// outcome, and a listener that subscribes after completion still sees it.
#[derive(Debug, Clone)]
pub struct SaveCompletion {
    info: SessionInfo,
    rx: watch::Receiver<Option<SaveOutcome>>,
}

impl SaveCompletion {
    pub(crate) fn channel(info: SessionInfo) -> (watch::Sender<Option<SaveOutcome>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self { info, rx })
    }

    pub fn info(&self) -> SessionInfo {
        self.info
    }

    /// Outcome if the save has already finished.
    pub fn outcome(&self) -> Option<SaveOutcome> {
        self.rx.borrow().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub async fn wait(&self) -> SaveOutcome {
        let mut rx = self.rx.clone();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| SaveOutcome::Failed {
            info: self.info,
            message: "save task ended without reporting".into(),
        })
    }
}
