use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use crate::error::{MotionError, MotionResult};
use crate::models::CLASS_COUNT;

use super::engine::{ClassificationEngine, ModelInput};

/// Shared view of a [`FixedScoresEngine`]'s activity, kept after the engine
/// has been boxed and handed to a gate.
#[derive(Debug, Clone, Default)]
pub struct EngineProbe {
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    overlaps: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl EngineProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Invocations that started while another was still running.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Deterministic engine: returns its score vectors in rotation, regardless of
/// input.
pub struct FixedScoresEngine {
    outputs: Vec<[f32; CLASS_COUNT]>,
    hold: Duration,
    fail_on_call: Option<usize>,
    probe: EngineProbe,
}

impl FixedScoresEngine {
    pub fn new(scores: [f32; CLASS_COUNT]) -> Self {
        Self::sequence(vec![scores])
    }

    /// Call `n` returns `outputs[n % len]`. An empty list returns zeros.
    pub fn sequence(outputs: Vec<[f32; CLASS_COUNT]>) -> Self {
        Self {
            outputs,
            hold: Duration::ZERO,
            fail_on_call: None,
            probe: EngineProbe::default(),
        }
    }

    /// Blocks each call for `hold`, widening the window in which an
    /// overlapping call would be caught.
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// The zero-based `call` fails with `EngineFailure`.
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn probe(&self) -> EngineProbe {
        self.probe.clone()
    }
}

impl ClassificationEngine for FixedScoresEngine {
    fn run(&mut self, _input: &ModelInput) -> MotionResult<[f32; CLASS_COUNT]> {
        if self.probe.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.hold.is_zero() {
            std::thread::sleep(self.hold);
        }
        let call = self.probe.calls.fetch_add(1, Ordering::SeqCst);
        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on_call == Some(call) {
            return Err(MotionError::EngineFailure(format!("scripted failure on call {call}")));
        }
        if self.outputs.is_empty() {
            return Ok([0.0; CLASS_COUNT]);
        }
        Ok(self.outputs[call % self.outputs.len()])
    }

    fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}
