pub mod analysis;
pub mod collection;
pub mod commands;
pub mod error;
pub mod inference;
pub mod models;
pub mod sensing;
pub mod settings;
pub mod storage;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use analysis::SessionAnalyzer;
use collection::{CollectionController, SessionIdAllocator};
use inference::{InferenceGate, LinearEngine};
use models::SessionId;
use sensing::{FuserConfig, SampleFuser};
use settings::{Settings, SettingsStore};
use storage::{SessionCatalog, SessionStore};

pub use error::{ErrorKind, MotionError, MotionResult};

/// Everything a command needs, wired from one [`Settings`].
pub struct AppState {
    pub settings: Settings,
    pub store: SessionStore,
    pub catalog: SessionCatalog,
    pub fuser: Arc<SampleFuser>,
    pub controller: CollectionController,
    pub analyzer: SessionAnalyzer,
}

impl AppState {
    /// Must run inside a tokio runtime.
    pub async fn build(settings: Settings) -> Result<Self> {
        let store = SessionStore::new(settings.data_dir.clone())
            .with_context(|| format!("failed to open data dir {}", settings.data_dir.display()))?;

        let catalog = SessionCatalog::new();
        let known = catalog
            .reload(&store)
            .await
            .context("failed to list stored sessions")?;
        log::info!("{known} stored sessions found");

        let fuser = Arc::new(SampleFuser::new(FuserConfig {
            period: settings.sample_period(),
            buffer_capacity: settings.sample_buffer_capacity,
        }));
        let ids = Arc::new(SessionIdAllocator::new(
            Arc::new(store.clone()),
            settings.id_read_timeout(),
        ));
        let controller = CollectionController::new(fuser.clone(), ids, Arc::new(store.clone()))
            .with_catalog(catalog.clone())
            .with_stats_interval(settings.stats_interval());

        let gate = Arc::new(InferenceGate::new(LinearEngine::loader(
            settings.model_path.clone(),
        )));
        let analyzer = SessionAnalyzer::new(gate).with_window_size(settings.window_size);

        Ok(Self {
            settings,
            store,
            catalog,
            fuser,
            controller,
            analyzer,
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "motion-logger")]
#[command(about = "Record motion sensor sessions and classify them by activity", long_about = None)]
struct Cli {
    /// Settings file (JSON). Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "motion-logger.json")]
    settings: PathBuf,

    /// Overrides the configured data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a session from simulated sensors.
    Record {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// List stored sessions.
    List,
    /// Delete a stored session.
    Remove { id: SessionId },
    /// Classify a stored session window by window.
    Analyze { id: SessionId },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    log::info!("motion-logger starting up...");

    let settings_store = SettingsStore::new(cli.settings)?;
    let mut settings = settings_store.get().with_env_overrides();
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let state = AppState::build(settings).await?;
        match cli.command {
            Command::Record { seconds } => commands::record(&state, seconds).await,
            Command::List => commands::list(&state).await,
            Command::Remove { id } => commands::remove(&state, id).await,
            Command::Analyze { id } => commands::analyze(&state, id).await,
        }
    })
}
