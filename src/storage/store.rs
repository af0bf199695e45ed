use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::oneshot;

use crate::error::{MotionError, MotionResult};
use crate::models::{CollectingSession, SessionId, SessionInfo};

use super::record::{self, SessionRecord};
use super::{LastIdStore, SessionSink};

pub const SESSIONS_DIR: &str = "sessions";
pub const LAST_ID_FILE: &str = "last_session_id.txt";

type StoreTask = Box<dyn FnOnce(&StoreLayout) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

/// Where things live under the data directory.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    pub sessions_dir: PathBuf,
    pub last_id_path: PathBuf,
}

impl StoreLayout {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            sessions_dir: data_dir.join(SESSIONS_DIR),
            last_id_path: data_dir.join(LAST_ID_FILE),
        }
    }

    fn record_path(&self, file_name: &str) -> PathBuf {
        self.sessions_dir.join(file_name)
    }

    /// Decodable record names in the sessions directory, sorted by name.
    /// A missing directory is an empty store.
    fn entries(&self) -> MotionResult<Vec<(String, SessionInfo)>> {
        let dir = match fs::read_dir(&self.sessions_dir) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(MotionError::storage(
                    format!("failed to list {}", self.sessions_dir.display()),
                    err,
                ))
            }
        };

        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|err| MotionError::storage("failed to read entry", err))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            match record::parse_file_name(&name) {
                Some(info) => entries.push((name, info)),
                None => debug!("ignoring unrecognised file {name}"),
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

struct StoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

/// File-backed session persistence. All file I/O runs on one dedicated
/// thread, so operations from any task are applied in submission order.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
    data_dir: Arc<PathBuf>,
}

impl SessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> MotionResult<Self> {
        let data_dir = data_dir.into();
        let layout = StoreLayout::new(&data_dir);
        fs::create_dir_all(&layout.sessions_dir).map_err(|err| {
            MotionError::storage(
                format!("failed to create {}", layout.sessions_dir.display()),
                err,
            )
        })?;

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let worker = thread::Builder::new()
            .name("motion-store".into())
            .spawn(move || {
                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => task(&layout),
                        StoreCommand::Shutdown => break,
                    }
                }
                debug!("Store thread shutting down");
            })
            .map_err(|err| MotionError::storage("failed to spawn store worker thread", err))?;

        info!("Session store initialized at {}", data_dir.display());

        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            data_dir: Arc::new(data_dir),
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_path()
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join(SESSIONS_DIR)
    }

    async fn execute<F, T>(&self, task: F) -> MotionResult<T>
    where
        F: FnOnce(&StoreLayout) -> MotionResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |layout| {
            let result = task(layout);
            if reply_tx.send(result).is_err() {
                debug!("store caller dropped before receiving result");
            }
        }));

        self.inner.sender.send(command).map_err(|_| {
            MotionError::storage(
                "store thread is gone",
                io::Error::new(io::ErrorKind::BrokenPipe, "store worker stopped"),
            )
        })?;

        reply_rx.await.map_err(|_| {
            MotionError::storage(
                "store thread terminated unexpectedly",
                io::Error::new(io::ErrorKind::BrokenPipe, "reply dropped"),
            )
        })?
    }

    /// Writes one record for the session and returns its path.
    pub async fn save(&self, session: CollectingSession) -> MotionResult<PathBuf> {
        self.execute(move |layout| {
            let SessionRecord { file_name, body } = record::encode(&session);
            let path = layout.record_path(&file_name);
            let staging = layout.record_path(&format!("{file_name}.part"));

            fs::create_dir_all(&layout.sessions_dir).map_err(|err| {
                MotionError::storage(format!("failed to create {}", layout.sessions_dir.display()), err)
            })?;
            fs::write(&staging, body)
                .and_then(|_| fs::rename(&staging, &path))
                .map_err(|err| {
                    let _ = fs::remove_file(&staging);
                    MotionError::storage(format!("failed to write {}", path.display()), err)
                })?;

            info!(
                "Saved session {} ({} samples) to {}",
                session.id(),
                session.samples.len(),
                path.display()
            );
            Ok(path)
        })
        .await
    }

    /// Every decodable record's info, ordered by filename.
    pub async fn list(&self) -> MotionResult<Vec<SessionInfo>> {
        self.execute(|layout| {
            Ok(layout
                .entries()?
                .into_iter()
                .map(|(_, info)| info)
                .collect())
        })
        .await
    }

    /// Reads a session back with its samples. `None` if no record carries
    /// the id.
    pub async fn load(&self, id: SessionId) -> MotionResult<Option<CollectingSession>> {
        self.execute(move |layout| {
            let Some((file_name, _)) = layout
                .entries()?
                .into_iter()
                .find(|(_, info)| info.id == id)
            else {
                return Ok(None);
            };

            let path = layout.record_path(&file_name);
            let body = fs::read_to_string(&path).map_err(|err| {
                MotionError::storage(format!("failed to read {}", path.display()), err)
            })?;
            record::decode(&SessionRecord { file_name, body }).map(Some)
        })
        .await
    }

    /// Deletes every record carrying the id. Returns whether anything was
    /// removed; an unknown id is not an error.
    pub async fn remove(&self, id: SessionId) -> MotionResult<bool> {
        self.execute(move |layout| {
            let mut removed = false;
            for (file_name, _) in layout
                .entries()?
                .into_iter()
                .filter(|(_, info)| info.id == id)
            {
                let path = layout.record_path(&file_name);
                match fs::remove_file(&path) {
                    Ok(()) => removed = true,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => {
                        return Err(MotionError::storage(
                            format!("failed to delete {}", path.display()),
                            err,
                        ))
                    }
                }
            }
            if removed {
                info!("Removed session {id}");
            }
            Ok(removed)
        })
        .await
    }

    /// Last id handed out. A missing or unreadable value counts as 0.
    pub async fn read_last_id(&self) -> MotionResult<SessionId> {
        self.execute(|layout| match fs::read_to_string(&layout.last_id_path) {
            Ok(text) => Ok(text.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring malformed last session id '{}'", text.trim());
                0
            })),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(MotionError::storage(
                format!("failed to read {}", layout.last_id_path.display()),
                err,
            )),
        })
        .await
    }

    pub async fn write_last_id(&self, id: SessionId) -> MotionResult<()> {
        self.execute(move |layout| {
            fs::write(&layout.last_id_path, id.to_string()).map_err(|err| {
                MotionError::storage(format!("failed to write {}", layout.last_id_path.display()), err)
            })
        })
        .await
    }
}

#[async_trait]
impl SessionSink for SessionStore {
    async fn save_session(&self, session: CollectingSession) -> MotionResult<PathBuf> {
        self.save(session).await
    }
}

#[async_trait]
impl LastIdStore for SessionStore {
    async fn load_last_id(&self) -> MotionResult<SessionId> {
        self.read_last_id().await
    }

    async fn save_last_id(&self, id: SessionId) -> MotionResult<()> {
        self.write_last_id(id).await
    }
}
