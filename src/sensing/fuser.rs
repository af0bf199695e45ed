use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam::atomic::AtomicCell;
use log::{debug, info};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::MotionResult;
use crate::models::{EulerAngles, SensorSample, Vec3};

use super::loop_worker::fusion_loop;
use super::orientation;
use super::source::SensorKind;

/// Last-known value per sensor channel. Each cell has exactly one writer
/// (its sensor producer) and one reader (the fusion tick).
#[derive(Default)]
pub struct SensorSlots {
    accel: AtomicCell<Option<Vec3>>,
    gyro: AtomicCell<Option<Vec3>>,
    orientation: AtomicCell<Option<EulerAngles>>,
}

impl SensorSlots {
    pub(crate) fn fuse(&self, timestamp_ms: i64) -> Option<SensorSample> {
        let accel = self.accel.load()?;
        let gyro = self.gyro.load()?;
        let orientation = self.orientation.load()?;
        Some(SensorSample::new(timestamp_ms, accel, gyro, orientation))
    }
}

#[derive(Default)]
pub struct FusionCounters {
    pub(crate) emitted: AtomicU64,
    pub(crate) skipped: AtomicU64,
    pub(crate) dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionStats {
    pub emitted: u64,
    pub skipped_ticks: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct FuserConfig {
    pub period: Duration,
    pub buffer_capacity: usize,
}

impl Default for FuserConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(20),
            buffer_capacity: 64,
        }
    }
}

struct FusionTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Merges the accelerometer, gyroscope and rotation-vector streams into one
/// fixed-rate [`SensorSample`] stream.
pub struct SampleFuser {
    slots: Arc<SensorSlots>,
    counters: Arc<FusionCounters>,
    config: FuserConfig,
    task: Mutex<Option<FusionTask>>,
}

impl SampleFuser {
    pub fn new(config: FuserConfig) -> Self {
        Self {
            slots: Arc::new(SensorSlots::default()),
            counters: Arc::new(FusionCounters::default()),
            config,
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> FuserConfig {
        self.config
    }

    pub fn update_accel(&self, value: Vec3) {
        self.slots.accel.store(Some(value));
    }

    pub fn update_gyro(&self, value: Vec3) {
        self.slots.gyro.store(Some(value));
    }

    pub fn update_orientation(&self, value: EulerAngles) {
        self.slots.orientation.store(Some(value));
    }

    /// Routes a raw sensor event to its slot. Rotation vectors are resolved
    /// to Euler angles here, on the producer's side.
    pub fn on_sensor_changed(&self, kind: SensorKind, values: &[f32]) -> MotionResult<()> {
        match kind {
            SensorKind::LinearAcceleration => self.update_accel(Vec3::from_slice(values)?),
            SensorKind::Gyroscope => self.update_gyro(Vec3::from_slice(values)?),
            SensorKind::GameRotationVector => {
                self.update_orientation(orientation::resolve(values)?)
            }
        }
        Ok(())
    }

    /// Starts the fusion tick. Returns the receiving end of the sample
    /// buffer, or `None` if the fuser is already running.
    pub fn start(&self) -> Option<mpsc::Receiver<SensorSample>> {
        self.start_at(Instant::now())
    }

    /// Like [`start`](Self::start), with sample timestamps counted from
    /// `anchor`. Ticks fall on `anchor + n * period`.
    pub fn start_at(&self, anchor: Instant) -> Option<mpsc::Receiver<SensorSample>> {
        let mut guard = lock_or_recover(&self.task);
        if guard.is_some() {
            debug!("sample fuser already running");
            return None;
        }

        self.counters.emitted.store(0, Ordering::Relaxed);
        self.counters.skipped.store(0, Ordering::Relaxed);
        self.counters.dropped.store(0, Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(self.config.buffer_capacity.max(1));
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(fusion_loop(
            self.slots.clone(),
            self.counters.clone(),
            anchor,
            self.config.period,
            tx,
            cancel_token.clone(),
        ));

        info!(
            "sample fuser started ({} ms period, buffer {})",
            self.config.period.as_millis(),
            self.config.buffer_capacity
        );
        *guard = Some(FusionTask {
            cancel_token,
            handle,
        });
        Some(rx)
    }

    /// Cancels the fusion tick. Does not wait for the task to wind down.
    pub fn stop(&self) {
        let Some(task) = lock_or_recover(&self.task).take() else {
            return;
        };
        task.cancel_token.cancel();
        drop(task.handle);

        let stats = self.stats();
        info!(
            "sample fuser stopped: {} emitted, {} ticks skipped, {} dropped",
            stats.emitted, stats.skipped_ticks, stats.dropped
        );
    }

    pub fn is_running(&self) -> bool {
        lock_or_recover(&self.task).is_some()
    }

    pub fn stats(&self) -> FusionStats {
        FusionStats {
            emitted: self.counters.emitted.load(Ordering::Relaxed),
            skipped_ticks: self.counters.skipped.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for SampleFuser {
    fn drop(&mut self) {
        if let Some(task) = lock_or_recover(&self.task).take() {
            task.cancel_token.cancel();
        }
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fuser_with(period_ms: u64, capacity: usize) -> SampleFuser {
        SampleFuser::new(FuserConfig {
            period: Duration::from_millis(period_ms),
            buffer_capacity: capacity,
        })
    }

    fn feed_all(fuser: &SampleFuser) {
        fuser.update_accel(Vec3::new(0.1, 0.2, 0.3));
        fuser.update_gyro(Vec3::new(1.0, 2.0, 3.0));
        fuser.update_orientation(EulerAngles {
            roll: 0.5,
            pitch: 0.6,
            yaw: 0.7,
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_when_all_channels_present() {
        let fuser = fuser_with(20, 64);
        feed_all(&fuser);
        let mut rx = fuser.start().unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.timestamp_ms, 20);
        assert_eq!(second.timestamp_ms, 40);
        assert_eq!(first.gyro, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(first.yaw, 0.7);

        fuser.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_ticks_until_every_channel_reports() {
        let fuser = fuser_with(20, 64);
        fuser.update_accel(Vec3::new(0.1, 0.2, 0.3));
        fuser.update_gyro(Vec3::new(1.0, 2.0, 3.0));
        let mut rx = fuser.start().unwrap();

        tokio::time::sleep(Duration::from_millis(105)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(fuser.stats().emitted, 0);
        assert!(fuser.stats().skipped_ticks >= 4);

        fuser
            .on_sensor_changed(SensorKind::GameRotationVector, &[0.0, 0.0, 0.0, 1.0])
            .unwrap();
        let sample = rx.recv().await.unwrap();
        assert_eq!(sample.timestamp_ms, 120);
        fuser.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_buffer_drops_newest() {
        let fuser = fuser_with(10, 2);
        feed_all(&fuser);
        let mut rx = fuser.start().unwrap();

        tokio::time::sleep(Duration::from_millis(55)).await;
        fuser.stop();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.timestamp_ms, second.timestamp_ms), (10, 20));
        assert!(fuser.stats().dropped >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_ticks_keep_scheduled_timestamps() {
        let fuser = fuser_with(20, 64);
        feed_all(&fuser);
        let mut rx = fuser.start().unwrap();
        tokio::task::yield_now().await;

        // The loop wakes long after its first deadline.
        tokio::time::advance(Duration::from_millis(45)).await;
        let late = rx.recv().await.unwrap();
        let next = rx.recv().await.unwrap();
        assert_eq!(late.timestamp_ms, 20);
        assert!(next.timestamp_ms > late.timestamp_ms);
        fuser.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timestamps_count_from_anchor() {
        let fuser = fuser_with(20, 64);
        feed_all(&fuser);
        let anchor = Instant::now();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let mut rx = fuser.start_at(anchor).unwrap();
        assert_eq!(rx.recv().await.unwrap().timestamp_ms, 20);
        assert_eq!(rx.recv().await.unwrap().timestamp_ms, 40);
        fuser.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_are_idempotent() {
        let fuser = fuser_with(20, 8);
        let rx = fuser.start();
        assert!(rx.is_some());
        assert!(fuser.start().is_none());
        assert!(fuser.is_running());

        fuser.stop();
        fuser.stop();
        assert!(!fuser.is_running());

        let mut rx = rx.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_malformed_event_rejected() {
        let fuser = fuser_with(20, 8);
        assert!(fuser.on_sensor_changed(SensorKind::Gyroscope, &[1.0]).is_err());
        assert!(fuser
            .on_sensor_changed(SensorKind::GameRotationVector, &[0.0, 0.0])
            .is_err());
    }
}
