use anyhow::{anyhow, Context, Result};
use log::warn;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    collection::SaveOutcome,
    error::ErrorKind,
    models::SessionId,
    sensing::{simulated_producer, SensorAvailability, SensorKind, SimulatedMotion},
    utils::time_codec::{duration_label, elapsed_ms_to_mm_ss, seconds_to_hms},
    AppState,
};

const PROGRESS_EVERY_MS: u64 = 1000;

fn producer_period(kind: SensorKind) -> Duration {
    match kind {
        SensorKind::LinearAcceleration | SensorKind::Gyroscope => Duration::from_millis(10),
        SensorKind::GameRotationVector => Duration::from_millis(16),
    }
}

/// Records `seconds` of simulated motion, then waits for the save.
pub async fn record(state: &AppState, seconds: u64) -> Result<()> {
    let availability = SensorAvailability::all();
    if !availability.supports_collection() {
        return Err(anyhow!(
            "missing sensors: {:?}",
            availability.missing_for_collection()
        ));
    }

    let producers = CancellationToken::new();
    for (seed, kind) in SensorKind::ALL.into_iter().enumerate() {
        tokio::spawn(simulated_producer(
            state.fuser.clone(),
            kind,
            producer_period(kind),
            SimulatedMotion::default(),
            seed as u64,
            producers.clone(),
        ));
    }

    let Some(session_id) = state.controller.start().await else {
        producers.cancel();
        return Err(anyhow!("a collection is already running"));
    };
    println!("Recording session {session_id:03} for {seconds}s");

    let mut stats = state.controller.subscribe_stats();
    let deadline = time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    let mut last_report = 0;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = stats.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *stats.borrow_and_update();
                if current.elapsed_ms >= last_report + PROGRESS_EVERY_MS {
                    last_report = current.elapsed_ms;
                    println!(
                        "  {}  {} samples",
                        elapsed_ms_to_mm_ss(current.elapsed_ms),
                        current.sample_count
                    );
                }
            }
        }
    }

    let completion = state
        .controller
        .stop()
        .await
        .context("collection stopped unexpectedly")?;
    producers.cancel();

    match completion.wait().await {
        SaveOutcome::Saved { info, path } => {
            println!(
                "Saved session {:03} ({}) to {}",
                info.id,
                duration_label(info.duration_secs()),
                path.display()
            );
            Ok(())
        }
        SaveOutcome::Skipped => {
            println!("Nothing to save: no samples were collected");
            Ok(())
        }
        SaveOutcome::Failed { info, message } => {
            Err(anyhow!("failed to save session {}: {message}", info.id))
        }
    }
}

pub async fn list(state: &AppState) -> Result<()> {
    state.catalog.reload(&state.store).await?;
    let sessions = state.catalog.snapshot();
    if sessions.is_empty() {
        println!("No stored sessions in {}", state.store.sessions_dir().display());
        return Ok(());
    }

    for info in sessions {
        println!(
            "{:03}  {} - {}  {}",
            info.id,
            seconds_to_hms(info.start_time_of_day),
            seconds_to_hms(info.stop_time_of_day),
            duration_label(info.duration_secs())
        );
    }
    Ok(())
}

pub async fn remove(state: &AppState, id: SessionId) -> Result<()> {
    if state.store.remove(id).await? {
        state.catalog.remove(id);
        println!("Removed session {id:03}");
    } else {
        println!("No session {id:03}");
    }
    Ok(())
}

pub async fn analyze(state: &AppState, id: SessionId) -> Result<()> {
    let session = state
        .store
        .load(id)
        .await?
        .ok_or_else(|| anyhow!("no session {id:03}"))?;

    let outcome = state.analyzer.analyze(&session).await;
    state.analyzer.gate().close().await;

    match outcome {
        Ok(result) if result.is_empty() => {
            println!(
                "Session {id:03} has {} samples, too few for one window",
                session.samples.len()
            );
            Ok(())
        }
        Ok(result) => {
            println!(
                "Session {id:03}: {} windows",
                result.window_results.len()
            );
            for line in result.summary_lines() {
                println!("  {line}");
            }
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::AnalysisUnavailable => {
            warn!("{err}");
            println!("Session {id:03}: analysis unavailable");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
