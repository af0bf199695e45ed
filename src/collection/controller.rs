use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use log::{error, info, warn};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    models::{CollectingSession, SensorSample, SessionId, SessionInfo},
    sensing::SampleFuser,
    storage::{SessionCatalog, SessionSink},
    utils::time_codec::now_time_of_day,
};

use super::{
    id_allocator::SessionIdAllocator, CollectionState, CollectionStats, CollectionStatus,
    SaveCompletion, SaveOutcome,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_millis(200);

struct Workers {
    accumulate_token: CancellationToken,
    stats_token: CancellationToken,
    accumulator: JoinHandle<Vec<SensorSample>>,
    ticker: JoinHandle<()>,
}

/// Idle/Collecting state machine around one [`SampleFuser`].
///
/// `start` allocates an id and begins accumulating fused samples; `stop`
/// hands the accumulated session to the sink in the background and returns
/// a [`SaveCompletion`] that fires once the sink is done.
#[derive(Clone)]
pub struct CollectionController {
    state: Arc<Mutex<CollectionState>>,
    fuser: Arc<SampleFuser>,
    ids: Arc<SessionIdAllocator>,
    sink: Arc<dyn SessionSink>,
    catalog: Option<SessionCatalog>,
    stats_interval: Duration,
    workers: Arc<Mutex<Option<Workers>>>,
    samples_tx: Arc<watch::Sender<Option<SensorSample>>>,
    stats_tx: Arc<watch::Sender<CollectionStats>>,
    status_tx: Arc<watch::Sender<CollectionStatus>>,
    pending: Arc<std::sync::Mutex<Option<SaveCompletion>>>,
}

impl CollectionController {
    pub fn new(
        fuser: Arc<SampleFuser>,
        ids: Arc<SessionIdAllocator>,
        sink: Arc<dyn SessionSink>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CollectionState::default())),
            fuser,
            ids,
            sink,
            catalog: None,
            stats_interval: DEFAULT_STATS_INTERVAL,
            workers: Arc::new(Mutex::new(None)),
            samples_tx: Arc::new(watch::channel(None).0),
            stats_tx: Arc::new(watch::channel(CollectionStats::default()).0),
            status_tx: Arc::new(watch::channel(CollectionStatus::Idle).0),
            pending: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Successful saves are added to `catalog`.
    pub fn with_catalog(mut self, catalog: SessionCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub async fn status(&self) -> CollectionStatus {
        self.state.lock().await.status
    }

    pub fn stats(&self) -> CollectionStats {
        *self.stats_tx.borrow()
    }

    pub fn subscribe_samples(&self) -> watch::Receiver<Option<SensorSample>> {
        self.samples_tx.subscribe()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<CollectionStats> {
        self.stats_tx.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CollectionStatus> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_session_id(&self) -> watch::Receiver<Option<SessionId>> {
        self.ids.subscribe()
    }

    /// Completion handle of the most recent stop.
    pub fn pending_save(&self) -> Option<SaveCompletion> {
        match self.pending.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Begins a collection. Returns the new session id, or `None` when a
    /// collection is already running.
    ///
    /// The id is allocated only once the fuser has started, so a refused
    /// start never consumes one.
    pub async fn start(&self) -> Option<SessionId> {
        let mut state = self.state.lock().await;
        if state.status == CollectionStatus::Collecting {
            log_debug!("start ignored, already collecting");
            return None;
        }

        let started_at = Instant::now();
        let start_time_of_day = now_time_of_day();
        let Some(rx) = self.fuser.start_at(started_at) else {
            error!("Sample fuser is already running elsewhere, collection not started");
            return None;
        };

        self.stats_tx.send_replace(CollectionStats::default());

        let count = Arc::new(AtomicUsize::new(0));
        let accumulate_token = CancellationToken::new();
        let stats_token = CancellationToken::new();

        let accumulator = tokio::spawn(accumulate(
            rx,
            count.clone(),
            self.samples_tx.clone(),
            accumulate_token.clone(),
        ));
        let ticker = tokio::spawn(stats_loop(
            started_at,
            self.stats_interval,
            count,
            self.stats_tx.clone(),
            stats_token.clone(),
        ));

        if let Some(previous) = self.workers.lock().await.replace(Workers {
            accumulate_token,
            stats_token,
            accumulator,
            ticker,
        }) {
            previous.accumulate_token.cancel();
            previous.stats_token.cancel();
        }

        let session_id = self.ids.allocate().await;
        state.begin(session_id, start_time_of_day, started_at);

        self.status_tx.send_replace(CollectionStatus::Collecting);
        info!("Collection started for session {session_id}");

        Some(session_id)
    }

    /// Ends the collection and saves it in the background. Returns `None`
    /// when idle.
    pub async fn stop(&self) -> Option<SaveCompletion> {
        // Held across the fuser stop and the worker hand-off; a concurrent
        // start waits for both.
        let (session_id, start_time_of_day, workers) = {
            let mut state = self.state.lock().await;
            let (session_id, start_time_of_day) = state.finish()?;
            self.fuser.stop();
            let workers = self.workers.lock().await.take();
            (session_id, start_time_of_day, workers)
        };

        let samples = match workers {
            Some(workers) => {
                workers.stats_token.cancel();
                workers.accumulate_token.cancel();
                if let Err(err) = workers.ticker.await {
                    log_error!("statistics tick ended abnormally: {}", err);
                }
                match workers.accumulator.await {
                    Ok(samples) => samples,
                    Err(err) => {
                        error!("Sample accumulation task failed: {err}");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let info = SessionInfo::new(session_id, start_time_of_day, now_time_of_day());
        self.status_tx.send_replace(CollectionStatus::Idle);
        info!(
            "Collection stopped for session {session_id} with {} samples",
            samples.len()
        );

        let (done_tx, completion) = SaveCompletion::channel(info);
        match self.pending.lock() {
            Ok(mut guard) => *guard = Some(completion.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(completion.clone()),
        }

        let sink = self.sink.clone();
        let catalog = self.catalog.clone();
        let stats_tx = self.stats_tx.clone();

        tokio::spawn(async move {
            let outcome = save_session(sink, catalog, info, samples).await;
            stats_tx.send_replace(CollectionStats::default());
            done_tx.send_replace(Some(outcome));
        });

        Some(completion)
    }
}

async fn save_session(
    sink: Arc<dyn SessionSink>,
    catalog: Option<SessionCatalog>,
    info: SessionInfo,
    samples: Vec<SensorSample>,
) -> SaveOutcome {
    if samples.is_empty() {
        warn!("Nothing to save for session {}", info.id);
        return SaveOutcome::Skipped;
    }

    match sink.save_session(CollectingSession::new(info, samples)).await {
        Ok(path) => {
            if let Some(catalog) = catalog {
                catalog.add(info);
            }
            SaveOutcome::Saved { info, path }
        }
        Err(err) => {
            error!("Failed to save session {}: {err}", info.id);
            SaveOutcome::Failed {
                info,
                message: err.to_string(),
            }
        }
    }
}

/// Sole owner of the session's sample buffer. Returns it once cancelled or
/// once the fuser closes the channel.
async fn accumulate(
    mut rx: mpsc::Receiver<SensorSample>,
    count: Arc<AtomicUsize>,
    live_tx: Arc<watch::Sender<Option<SensorSample>>>,
    cancel_token: CancellationToken,
) -> Vec<SensorSample> {
    let mut samples = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            next = rx.recv() => match next {
                Some(sample) => {
                    samples.push(sample);
                    count.store(samples.len(), Ordering::Relaxed);
                    live_tx.send_replace(Some(sample));
                }
                None => break,
            },
        }
    }

    // Samples fused before the stop are still buffered.
    while let Ok(sample) = rx.try_recv() {
        samples.push(sample);
    }
    count.store(samples.len(), Ordering::Relaxed);

    log_debug!("accumulator finished with {} samples", samples.len());
    samples
}

async fn stats_loop(
    started_at: Instant,
    interval: Duration,
    count: Arc<AtomicUsize>,
    stats_tx: Arc<watch::Sender<CollectionStats>>,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval_at(started_at + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                stats_tx.send_replace(CollectionStats {
                    elapsed_ms: started_at.elapsed().as_millis() as u64,
                    sample_count: count.load(Ordering::Relaxed),
                });
            }
        }
    }
}
