use std::sync::Arc;

use log::info;

use crate::error::{MotionError, MotionResult};
use crate::inference::InferenceGate;
use crate::models::{CollectingSession, SessionAnalysisResult, WindowPrediction};

use super::windower::{window, window_count, WINDOW_SIZE};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Classifies a session window by window through the shared gate.
#[derive(Clone)]
pub struct SessionAnalyzer {
    gate: Arc<InferenceGate>,
    window_size: usize,
}

impl SessionAnalyzer {
    pub fn new(gate: Arc<InferenceGate>) -> Self {
        Self {
            gate,
            window_size: WINDOW_SIZE,
        }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn gate(&self) -> &Arc<InferenceGate> {
        &self.gate
    }

    /// Windows are classified in order, one at a time. Any engine error fails
    /// the whole analysis with `AnalysisUnavailable`; no partial result is
    /// returned.
    pub async fn analyze(&self, session: &CollectingSession) -> MotionResult<SessionAnalysisResult> {
        let expected = window_count(session.samples.len(), self.window_size);
        let windows = window(&session.samples, self.window_size);

        if windows.is_empty() {
            log_debug!(
                "session {} has {} samples, fewer than one window",
                session.id(),
                session.samples.len()
            );
            return Ok(SessionAnalysisResult::default());
        }

        let mut results = Vec::with_capacity(windows.len());
        for (window_index, samples) in windows.iter().enumerate() {
            let output = self
                .gate
                .run(samples)
                .await
                .map_err(|err| MotionError::AnalysisUnavailable(Box::new(err)))?;
            results.push(WindowPrediction {
                window_index,
                predicted_class: output.predicted_class(),
            });
        }

        info!(
            "Analysed session {}: {} windows expected, {} produced",
            session.id(),
            expected,
            results.len()
        );
        Ok(SessionAnalysisResult::new(results))
    }
}
