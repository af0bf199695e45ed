use std::mem;

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::analysis::windower::SampleWindow;
use crate::error::{MotionError, MotionResult};
use crate::models::ModelOutput;

use super::engine::{ClassificationEngine, EngineLoader, ModelInput};

enum EngineSlot {
    Uninitialized(EngineLoader),
    Ready(Box<dyn ClassificationEngine>),
    Closed,
}

/// Owns the one engine instance and lets a single inference through at a
/// time. The engine is built on the first `run`, under the same lock.
pub struct InferenceGate {
    slot: Mutex<EngineSlot>,
}

impl InferenceGate {
    pub fn new(loader: EngineLoader) -> Self {
        Self {
            slot: Mutex::new(EngineSlot::Uninitialized(loader)),
        }
    }

    pub fn with_engine(engine: Box<dyn ClassificationEngine>) -> Self {
        Self {
            slot: Mutex::new(EngineSlot::Ready(engine)),
        }
    }

    pub async fn is_loaded(&self) -> bool {
        matches!(*self.slot.lock().await, EngineSlot::Ready(_))
    }

    pub async fn run(&self, window: &SampleWindow<'_>) -> MotionResult<ModelOutput> {
        let input = ModelInput::from_window(window)?;
        let mut slot = self.slot.lock().await;

        if let EngineSlot::Uninitialized(loader) = &*slot {
            let engine = load(loader.clone()).await?;
            *slot = EngineSlot::Ready(engine);
        }

        match &mut *slot {
            EngineSlot::Ready(engine) => engine.run(&input).map(ModelOutput::new),
            EngineSlot::Closed => Err(MotionError::EngineClosed),
            EngineSlot::Uninitialized(_) => Err(MotionError::EngineFailure(
                "engine not initialised".into(),
            )),
        }
    }

    /// Releases the engine. Later `run` calls fail with `EngineClosed`.
    pub async fn close(&self) {
        let previous = mem::replace(&mut *self.slot.lock().await, EngineSlot::Closed);
        match previous {
            EngineSlot::Ready(mut engine) => {
                engine.close();
                info!("Inference engine closed");
            }
            EngineSlot::Uninitialized(_) => debug!("Inference gate closed before first use"),
            EngineSlot::Closed => {}
        }
    }
}

async fn load(loader: EngineLoader) -> MotionResult<Box<dyn ClassificationEngine>> {
    let started = Instant::now();
    let engine = tokio::task::spawn_blocking(move || loader())
        .await
        .map_err(|err| MotionError::EngineFailure(format!("engine loader panicked: {err}")))?;

    match engine {
        Ok(engine) => {
            info!(
                "Inference engine loaded in {} ms",
                started.elapsed().as_millis()
            );
            Ok(engine)
        }
        Err(err) => {
            warn!("Inference engine failed to load: {err}");
            Err(err)
        }
    }
}
