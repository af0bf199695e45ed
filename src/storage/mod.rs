pub mod catalog;
pub mod record;
pub mod store;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::MotionResult;
use crate::models::{CollectingSession, SessionId};

pub use catalog::SessionCatalog;
pub use record::SessionRecord;
pub use store::SessionStore;

/// Destination for finished sessions.
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn save_session(&self, session: CollectingSession) -> MotionResult<PathBuf>;
}

/// Durable home of the last session id handed out.
#[async_trait]
pub trait LastIdStore: Send + Sync {
    async fn load_last_id(&self) -> MotionResult<SessionId>;
    async fn save_last_id(&self, id: SessionId) -> MotionResult<()>;
}
