//! Session persistence
//!
//! The whole session (sources with their raw bytes plus page metadata) is
//! written as one record under a single key after every committed change.
//! Failures are reported to the caller but never affect the in-memory
//! workspace, which stays authoritative.

mod record;
mod store;

pub use record::{PageRecord, SessionRecord, SourceRecord};
pub use store::{FileStore, MemoryStore, SessionStore};

use crate::model::PageSequence;
use crate::source::SourceRegistry;
use crate::types::*;

pub struct SessionPersistence {
    store: Box<dyn SessionStore>,
    key: String,
}

impl SessionPersistence {
    pub fn new(store: impl SessionStore + 'static, key: impl Into<String>) -> Self {
        Self {
            store: Box::new(store),
            key: key.into(),
        }
    }

    /// Atomically replace the stored session.
    ///
    /// Encoding every source's bytes is CPU-bound, so it runs on the
    /// blocking pool; the write itself goes through the async store.
    pub async fn save(&mut self, registry: &SourceRegistry, pages: &PageSequence) -> Result<()> {
        let record = SessionRecord::capture(registry, pages);
        let json = tokio::task::spawn_blocking(move || record.to_json()).await??;
        self.store
            .put(&self.key, json)
            .await
            .map_err(|e| ComposeError::Persistence(e.to_string()))
    }

    /// The last saved session, or `None` if absent or unreadable
    pub async fn load(&self) -> Option<SessionRecord> {
        let bytes = match self.store.get(&self.key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Could not read saved session: {}", e);
                return None;
            }
        };

        match tokio::task::spawn_blocking(move || SessionRecord::from_json(&bytes)).await {
            Ok(Ok(record)) => Some(record),
            Ok(Err(e)) => {
                log::warn!("Ignoring corrupt saved session: {}", e);
                None
            }
            Err(e) => {
                log::warn!("Session decode task failed: {}", e);
                None
            }
        }
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.store
            .remove(&self.key)
            .await
            .map_err(|e| ComposeError::Persistence(e.to_string()))
    }
}

impl std::fmt::Debug for SessionPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPersistence")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
