use std::path::PathBuf;
use std::sync::Arc;

use civic_api::CivicClient;
use civic_session::{ChatSession, FileSessionStore, LaunchKind, ResetLatch, SearchDebouncer};
use tracing::debug;

use crate::error::CivError;

pub type Session = ChatSession<CivicClient, FileSessionStore>;
pub type Search = SearchDebouncer<CivicClient, FileSessionStore>;

/// Backend client plus the persisted session store, shared by every command.
#[derive(Clone)]
pub struct AppContext {
    pub client: Arc<CivicClient>,
    pub store: Arc<FileSessionStore>,
}

impl AppContext {
    pub fn open(base_url: String, session_path: PathBuf) -> Result<Self, CivError> {
        let store = FileSessionStore::open(&session_path)?;
        debug!(base_url = %base_url, session = %session_path.display(), "Opened session store");
        Ok(Self {
            client: Arc::new(CivicClient::with_base_url(base_url)),
            store: Arc::new(store),
        })
    }

    pub fn session(&self, latch: ResetLatch, kind: LaunchKind) -> Session {
        ChatSession::launch(
            Arc::clone(&self.client),
            Arc::clone(&self.store),
            latch,
            kind,
        )
    }

    pub fn search(&self) -> Search {
        SearchDebouncer::new(Arc::clone(&self.client), Arc::clone(&self.store))
    }
}
