//! Sensor producers feeding the [`SampleFuser`](super::SampleFuser).
//!
//! On a device each channel is driven by the platform's sensor callbacks.
//! The headless binary has no hardware, so it uses [`simulated_producer`],
//! which synthesises a gait-like signal at the channel's own rate.

use std::f32::consts::TAU;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::fuser::SampleFuser;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SensorKind {
    LinearAcceleration,
    Gyroscope,
    GameRotationVector,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [
        SensorKind::LinearAcceleration,
        SensorKind::Gyroscope,
        SensorKind::GameRotationVector,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SensorKind::LinearAcceleration => "linear-acceleration",
            SensorKind::Gyroscope => "gyroscope",
            SensorKind::GameRotationVector => "game-rotation-vector",
        }
    }
}

/// Which motion sensors the host device exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorAvailability {
    pub has_accelerometer: bool,
    pub has_gyroscope: bool,
    pub has_magnetometer: bool,
    pub has_game_rotation_vector: bool,
    pub has_rotation_vector: bool,
}

impl SensorAvailability {
    pub fn all() -> Self {
        Self {
            has_accelerometer: true,
            has_gyroscope: true,
            has_magnetometer: true,
            has_game_rotation_vector: true,
            has_rotation_vector: true,
        }
    }

    /// Fusion emits nothing unless all three fused channels report.
    pub fn supports_collection(&self) -> bool {
        self.has_accelerometer && self.has_gyroscope && self.has_game_rotation_vector
    }

    pub fn missing_for_collection(&self) -> Vec<SensorKind> {
        let mut missing = Vec::new();
        if !self.has_accelerometer {
            missing.push(SensorKind::LinearAcceleration);
        }
        if !self.has_gyroscope {
            missing.push(SensorKind::Gyroscope);
        }
        if !self.has_game_rotation_vector {
            missing.push(SensorKind::GameRotationVector);
        }
        missing
    }
}

/// Parameters of the synthetic gait signal.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedMotion {
    pub step_hz: f32,
    pub accel_amplitude: f32,
    pub gyro_amplitude: f32,
    pub noise: f32,
}

impl Default for SimulatedMotion {
    fn default() -> Self {
        Self {
            step_hz: 1.8,
            accel_amplitude: 2.5,
            gyro_amplitude: 0.6,
            noise: 0.05,
        }
    }
}

impl SimulatedMotion {
    fn reading(&self, kind: SensorKind, t: f32, rng: &mut StdRng) -> Vec<f32> {
        let phase = TAU * self.step_hz * t;
        let mut jitter = || rng.gen_range(-self.noise..=self.noise);
        match kind {
            SensorKind::LinearAcceleration => vec![
                0.3 * self.accel_amplitude * phase.sin() + jitter(),
                self.accel_amplitude * (2.0 * phase).sin().abs() + jitter(),
                0.5 * self.accel_amplitude * phase.cos() + jitter(),
            ],
            SensorKind::Gyroscope => vec![
                self.gyro_amplitude * phase.cos() + jitter(),
                0.4 * self.gyro_amplitude * phase.sin() + jitter(),
                0.2 * self.gyro_amplitude * (0.5 * phase).sin() + jitter(),
            ],
            SensorKind::GameRotationVector => {
                // Small sway around upright; w is left for the resolver to rebuild.
                let half = 0.5 * (0.15 * phase.sin() + jitter());
                vec![half.sin(), 0.0, 0.05 * half.sin()]
            }
        }
    }
}

/// Pushes synthetic readings for one channel into the fuser until cancelled.
pub async fn simulated_producer(
    fuser: Arc<SampleFuser>,
    kind: SensorKind,
    period: Duration,
    motion: SimulatedMotion,
    seed: u64,
    cancel_token: CancellationToken,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let started = Instant::now();
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut readings = 0u64;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                let values = motion.reading(kind, started.elapsed().as_secs_f32(), &mut rng);
                if let Err(err) = fuser.on_sensor_changed(kind, &values) {
                    log_warn!("{} reading rejected: {err}", kind.name());
                    continue;
                }
                readings += 1;
                if readings % 250 == 1 {
                    log_debug!("{} {:?}", kind.name(), values);
                }
            }
        }
    }

    log_debug!("{} producer stopped after {} readings", kind.name(), readings);
}
