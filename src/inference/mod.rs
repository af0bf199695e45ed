pub mod engine;
pub mod fixed;
pub mod gate;
pub mod linear;

pub use engine::{ClassificationEngine, EngineLoader, ModelInput};
pub use fixed::{EngineProbe, FixedScoresEngine};
pub use gate::InferenceGate;
pub use linear::LinearEngine;
