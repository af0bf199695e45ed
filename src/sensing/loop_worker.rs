use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::SensorSample;

use super::fuser::{FusionCounters, SensorSlots};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const DROP_LOG_EVERY: u64 = 50;

/// Emits one fused sample per tick while all three slots hold a value.
/// Ticks with a missing channel are skipped silently; a full output buffer
/// drops the new sample instead of waiting.
///
/// Samples are stamped with the tick's scheduled instant relative to
/// `anchor`, so late ticks never repeat a timestamp.
pub async fn fusion_loop(
    slots: Arc<SensorSlots>,
    counters: Arc<FusionCounters>,
    anchor: Instant,
    period: Duration,
    tx: mpsc::Sender<SensorSample>,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval_at(anchor + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_debug!("fusion loop cancelled");
                break;
            }
            scheduled = ticker.tick() => {
                let timestamp_ms = scheduled.saturating_duration_since(anchor).as_millis() as i64;
                let Some(sample) = slots.fuse(timestamp_ms) else {
                    counters.skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                };

                match tx.try_send(sample) {
                    Ok(()) => {
                        counters.emitted.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Full(_)) => {
                        let dropped = counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        if dropped % DROP_LOG_EVERY == 1 {
                            log_debug!("sample buffer full, {} samples dropped so far", dropped);
                        }
                    }
                    Err(TrySendError::Closed(_)) => {
                        log_info!("sample receiver closed, fusion loop exiting");
                        break;
                    }
                }
            }
        }
    }
}
