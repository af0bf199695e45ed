use serde::{Deserialize, Serialize};

use crate::error::{MotionError, MotionResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Takes the first three components of a raw sensor event payload.
    pub fn from_slice(values: &[f32]) -> MotionResult<Self> {
        match values {
            [x, y, z, ..] => Ok(Self::new(*x, *y, *z)),
            _ => Err(MotionError::InvalidInput(format!(
                "expected at least 3 components, got {}",
                values.len()
            ))),
        }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Orientation in radians, already remapped to roll/pitch/yaw order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// One fused observation. `timestamp_ms` counts from the start of the collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    pub timestamp_ms: i64,
    pub accel: Vec3,
    pub gyro: Vec3,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl SensorSample {
    pub fn new(timestamp_ms: i64, accel: Vec3, gyro: Vec3, orientation: EulerAngles) -> Self {
        Self {
            timestamp_ms,
            accel,
            gyro,
            roll: orientation.roll,
            pitch: orientation.pitch,
            yaw: orientation.yaw,
        }
    }

    pub fn orientation(&self) -> EulerAngles {
        EulerAngles {
            roll: self.roll,
            pitch: self.pitch,
            yaw: self.yaw,
        }
    }
}
