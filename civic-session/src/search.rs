use std::sync::Arc;
use std::time::Duration;

use civic_api::{ChatBackend, ConversationSummary};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::identity::IdentityResolver;
use crate::store::SessionStore;

pub const DEFAULT_SEARCH_DELAY: Duration = Duration::from_millis(500);

/// What the conversation list currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    /// The search box text, updated on every edit.
    pub query: String,
    /// True from an edit until its request has completed.
    pub pending: bool,
    pub conversations: Vec<ConversationSummary>,
    /// Message of the last failed request. The list keeps its previous
    /// contents on failure; the next success clears this.
    pub error: Option<String>,
}

struct SearchInner<B, S> {
    backend: Arc<B>,
    identity: IdentityResolver<S>,
    state: watch::Sender<SearchState>,
    delay: Duration,
}

impl<B: ChatBackend, S: SessionStore> SearchInner<B, S> {
    async fn fetch(&self, query: &str) -> Result<Vec<ConversationSummary>, SessionError> {
        let Some(token) = self.identity.credential() else {
            debug!("No credential, conversation list is empty");
            return Ok(Vec::new());
        };
        let result = if query.trim().is_empty() {
            self.backend.list_conversations(&token).await
        } else {
            debug!(query, "Searching conversations");
            self.backend.search_conversations(&token, query).await
        };
        Ok(result?)
    }

    async fn load(&self, query: &str) {
        let result = self.fetch(query).await;
        self.state.send_modify(|state| {
            state.pending = false;
            match result {
                Ok(conversations) => {
                    state.conversations = conversations;
                    state.error = None;
                }
                Err(e) => {
                    warn!(error = %e, "Conversation list request failed");
                    state.error = Some(e.to_string());
                }
            }
        });
    }
}

/// Coalesces search-box edits into one delayed request.
///
/// Each edit restarts the delay; a superseded edit's task is aborted, so at
/// most one request is outstanding and a stale result is never published.
/// Clearing the box loads the default conversation list instead of
/// searching. Must be used inside a tokio runtime.
pub struct SearchDebouncer<B, S> {
    inner: Arc<SearchInner<B, S>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<B, S> SearchDebouncer<B, S>
where
    B: ChatBackend + 'static,
    S: SessionStore + 'static,
{
    pub fn new(backend: Arc<B>, store: Arc<S>) -> Self {
        Self::with_delay(backend, store, DEFAULT_SEARCH_DELAY)
    }

    pub fn with_delay(backend: Arc<B>, store: Arc<S>, delay: Duration) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            inner: Arc::new(SearchInner {
                backend,
                identity: IdentityResolver::new(store),
                state,
                delay,
            }),
            pending: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    fn cancel_pending(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }

    /// Records the new text immediately and (re)starts the delay.
    pub fn on_query_change(&self, text: impl Into<String>) {
        let text = text.into();
        self.inner.state.send_modify(|state| {
            state.query.clone_from(&text);
            state.pending = true;
        });

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            inner.load(&text).await;
        });

        if let Some(previous) = self.pending.lock().replace(task) {
            previous.abort();
        }
    }

    /// Loads the default conversation list now, dropping any pending search.
    pub async fn refresh_default(&self) {
        self.cancel_pending();
        self.inner.load("").await;
    }
}

impl<B, S> Drop for SearchDebouncer<B, S> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
        }
    }
}
