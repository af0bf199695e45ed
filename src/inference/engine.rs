//! Classification engine contract.
//!
//! An engine takes one window as a dense `(1, 128, 9)` tensor and returns
//! six class scores. Rows are timesteps; the nine channels per row are
//! `roll, pitch, yaw, gyro.x, gyro.y, gyro.z, accel.x, accel.y, accel.z`.
//! This order is not the record column order.

use std::sync::Arc;

use crate::analysis::windower::{SampleWindow, WINDOW_SIZE};
use crate::error::{MotionError, MotionResult};
use crate::models::{SensorSample, CLASS_COUNT};

pub const CHANNELS: usize = 9;

/// Channel layout of one timestep.
pub fn channels(sample: &SensorSample) -> [f32; CHANNELS] {
    [
        sample.roll,
        sample.pitch,
        sample.yaw,
        sample.gyro.x,
        sample.gyro.y,
        sample.gyro.z,
        sample.accel.x,
        sample.accel.y,
        sample.accel.z,
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    rows: Vec<[f32; CHANNELS]>,
}

impl ModelInput {
    pub fn from_window(window: &SampleWindow<'_>) -> MotionResult<Self> {
        if window.len() != WINDOW_SIZE {
            return Err(MotionError::InvalidInput(format!(
                "engine expects {WINDOW_SIZE} timesteps, window has {}",
                window.len()
            )));
        }
        Ok(Self {
            rows: window.samples().iter().map(channels).collect(),
        })
    }

    pub fn rows(&self) -> &[[f32; CHANNELS]] {
        &self.rows
    }

    /// Row-major `(1, 128, 9)` buffer.
    pub fn to_flat(&self) -> Vec<f32> {
        self.rows.iter().flatten().copied().collect()
    }

    pub fn channel(&self, index: usize) -> impl Iterator<Item = f32> + '_ {
        self.rows.iter().map(move |row| row[index])
    }
}

/// A loaded classifier. Implementations need not be reentrant; callers go
/// through [`InferenceGate`](super::InferenceGate).
pub trait ClassificationEngine: Send {
    fn run(&mut self, input: &ModelInput) -> MotionResult<[f32; CLASS_COUNT]>;

    /// Releases the engine's resources.
    fn close(&mut self) {}
}

/// Builds an engine on first use. May be slow; runs on a blocking worker.
pub type EngineLoader =
    Arc<dyn Fn() -> MotionResult<Box<dyn ClassificationEngine>> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::windower::window;
    use crate::models::{EulerAngles, Vec3};

    #[test]
    fn test_channel_order() {
        let sample = SensorSample::new(
            0,
            Vec3::new(7.0, 8.0, 9.0),
            Vec3::new(4.0, 5.0, 6.0),
            EulerAngles {
                roll: 1.0,
                pitch: 2.0,
                yaw: 3.0,
            },
        );
        assert_eq!(
            channels(&sample),
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]
        );

        let samples = vec![sample; WINDOW_SIZE];
        let windows = window(&samples, WINDOW_SIZE);
        let input = ModelInput::from_window(&windows[0]).unwrap();
        let flat = input.to_flat();
        assert_eq!(flat.len(), WINDOW_SIZE * CHANNELS);
        assert_eq!(&flat[9..18], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert!(input.channel(6).all(|v| v == 7.0));
    }

    #[test]
    fn test_wrong_window_length_rejected() {
        let samples = vec![
            SensorSample::new(0, Vec3::default(), Vec3::default(), EulerAngles::default());
            10
        ];
        let windows = window(&samples, 5);
        assert!(ModelInput::from_window(&windows[0]).is_err());
    }
}
