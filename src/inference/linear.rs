use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MotionError, MotionResult};
use crate::models::CLASS_COUNT;

use super::engine::{ClassificationEngine, EngineLoader, ModelInput, CHANNELS};

pub const FEATURES: usize = CHANNELS * 2;

/// On-disk form of the model: one weight row per class over the per-channel
/// means followed by the per-channel standard deviations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelArtifact {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

/// Softmax-regression classifier over window summary statistics.
pub struct LinearEngine {
    weights: [[f32; FEATURES]; CLASS_COUNT],
    bias: [f32; CLASS_COUNT],
    closed: bool,
}

impl LinearEngine {
    pub fn new(weights: [[f32; FEATURES]; CLASS_COUNT], bias: [f32; CLASS_COUNT]) -> Self {
        Self {
            weights,
            bias,
            closed: false,
        }
    }

    pub fn from_artifact(artifact: &LinearModelArtifact) -> MotionResult<Self> {
        if artifact.weights.len() != CLASS_COUNT || artifact.bias.len() != CLASS_COUNT {
            return Err(MotionError::EngineFailure(format!(
                "model must have {CLASS_COUNT} weight rows and biases, found {} and {}",
                artifact.weights.len(),
                artifact.bias.len()
            )));
        }

        let mut weights = [[0f32; FEATURES]; CLASS_COUNT];
        for (class, (row, source)) in weights.iter_mut().zip(&artifact.weights).enumerate() {
            if source.len() != FEATURES {
                return Err(MotionError::EngineFailure(format!(
                    "weight row {class} has {} values, expected {FEATURES}",
                    source.len()
                )));
            }
            row.copy_from_slice(source);
        }

        let mut bias = [0f32; CLASS_COUNT];
        bias.copy_from_slice(&artifact.bias);
        Ok(Self::new(weights, bias))
    }

    pub fn from_json(text: &str) -> MotionResult<Self> {
        let artifact: LinearModelArtifact = serde_json::from_str(text)
            .map_err(|err| MotionError::EngineFailure(format!("invalid model artifact: {err}")))?;
        Self::from_artifact(&artifact)
    }

    pub fn load(path: &Path) -> MotionResult<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            MotionError::storage(format!("failed to read model {}", path.display()), err)
        })?;
        Self::from_json(&text)
    }

    /// Loader for [`InferenceGate`](super::InferenceGate). Without a path the
    /// loader fails, and so does every analysis.
    pub fn loader(path: Option<PathBuf>) -> EngineLoader {
        Arc::new(move || match &path {
            Some(path) => {
                Ok(Box::new(LinearEngine::load(path)?) as Box<dyn ClassificationEngine>)
            }
            None => Err(MotionError::EngineFailure(
                "no model artifact configured".into(),
            )),
        })
    }
}

/// Per-channel mean, then per-channel population standard deviation.
pub fn features(input: &ModelInput) -> [f32; FEATURES] {
    let mut out = [0f32; FEATURES];
    let n = input.rows().len().max(1) as f32;

    for channel in 0..CHANNELS {
        let mean = input.channel(channel).sum::<f32>() / n;
        let variance = input
            .channel(channel)
            .map(|v| (v - mean) * (v - mean))
            .sum::<f32>()
            / n;
        out[channel] = mean;
        out[CHANNELS + channel] = variance.sqrt();
    }
    out
}

fn softmax(logits: [f32; CLASS_COUNT]) -> [f32; CLASS_COUNT] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut out = logits.map(|v| (v - max).exp());
    let total: f32 = out.iter().sum();
    if total > 0.0 {
        out.iter_mut().for_each(|v| *v /= total);
    }
    out
}

impl ClassificationEngine for LinearEngine {
    fn run(&mut self, input: &ModelInput) -> MotionResult<[f32; CLASS_COUNT]> {
        if self.closed {
            return Err(MotionError::EngineClosed);
        }

        let x = features(input);
        let mut logits = self.bias;
        for (logit, row) in logits.iter_mut().zip(&self.weights) {
            *logit += row.iter().zip(&x).map(|(w, v)| w * v).sum::<f32>();
        }
        Ok(softmax(logits))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::windower::{window, WINDOW_SIZE};
    use crate::models::{ActivityClass, EulerAngles, ModelOutput, SensorSample, Vec3};
    use approx::assert_relative_eq;

    fn input_with_accel_swing(amplitude: f32) -> ModelInput {
        let samples: Vec<_> = (0..WINDOW_SIZE)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                SensorSample::new(
                    i as i64 * 20,
                    Vec3::new(0.0, sign * amplitude, 0.0),
                    Vec3::new(0.5, 0.5, 0.5),
                    EulerAngles::default(),
                )
            })
            .collect();
        ModelInput::from_window(&window(&samples, WINDOW_SIZE)[0]).unwrap()
    }

    /// Sitting when the vertical acceleration is still, jogging when it swings.
    fn artifact_json() -> String {
        let mut weights = vec![vec![0.0f32; FEATURES]; CLASS_COUNT];
        weights[ActivityClass::Jogging.index()][CHANNELS + 7] = 4.0;
        let mut bias = vec![0.0f32; CLASS_COUNT];
        bias[ActivityClass::Sitting.index()] = 2.0;
        serde_json::to_string(&LinearModelArtifact { weights, bias }).unwrap()
    }

    #[test]
    fn test_features() {
        let x = features(&input_with_accel_swing(2.0));
        assert_relative_eq!(x[3], 0.5);
        assert_relative_eq!(x[7], 0.0);
        assert_relative_eq!(x[CHANNELS + 7], 2.0);
        assert_relative_eq!(x[CHANNELS + 3], 0.0);
    }

    #[test]
    fn test_classifies_from_artifact() {
        let mut engine = LinearEngine::from_json(&artifact_json()).unwrap();

        let still = ModelOutput::new(engine.run(&input_with_accel_swing(0.0)).unwrap());
        assert_eq!(still.predicted_class(), ActivityClass::Sitting);
        assert_relative_eq!(still.scores.iter().sum::<f32>(), 1.0, epsilon = 1e-5);

        let moving = ModelOutput::new(engine.run(&input_with_accel_swing(3.0)).unwrap());
        assert_eq!(moving.predicted_class(), ActivityClass::Jogging);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let artifact = LinearModelArtifact {
            weights: vec![vec![0.0; FEATURES]; 5],
            bias: vec![0.0; CLASS_COUNT],
        };
        assert!(LinearEngine::from_artifact(&artifact).is_err());

        let artifact = LinearModelArtifact {
            weights: vec![vec![0.0; 3]; CLASS_COUNT],
            bias: vec![0.0; CLASS_COUNT],
        };
        assert!(LinearEngine::from_artifact(&artifact).is_err());
        assert!(LinearEngine::from_json("{").is_err());
    }

    #[test]
    fn test_closed_engine_refuses() {
        let mut engine = LinearEngine::from_json(&artifact_json()).unwrap();
        engine.close();
        assert!(matches!(
            engine.run(&input_with_accel_swing(1.0)),
            Err(MotionError::EngineClosed)
        ));
    }

    #[test]
    fn test_loader_without_path_fails() {
        let loader = LinearEngine::loader(None);
        assert!(loader().is_err());
    }
}
