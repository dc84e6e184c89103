use std::sync::Arc;

use civic_api::{ApiError, ChatBackend, ChatReply, VerificationDetails, VerifiedAccount};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::conversation::ConversationCache;
use crate::error::{SendRejected, SessionError};
use crate::history::InputHistory;
use crate::identity::{Identity, IdentityResolver, LaunchKind};
use crate::liveness::ResetLatch;
use crate::loading::{LoadingMachine, LoadingSchedule, LoadingState};
use crate::message::Message;
use crate::store::SessionStore;

/// Shown in place of an answer when a send fails for any reason.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// The conversation session engine.
///
/// Holds the active conversation, the input history and the loading state,
/// and exchanges messages with the backend under the identity resolved from
/// the session store. All methods take `&self` so the session can be shared
/// with a spawned send while the front-end keeps reading it.
pub struct ChatSession<B, S> {
    backend: Arc<B>,
    identity: IdentityResolver<S>,
    conversation: Mutex<ConversationCache>,
    history: Mutex<InputHistory>,
    loading: LoadingMachine,
    latch: ResetLatch,
}

impl<B: ChatBackend, S: SessionStore> ChatSession<B, S> {
    pub fn new(backend: Arc<B>, store: Arc<S>, latch: ResetLatch) -> Self {
        Self::with_schedule(backend, store, latch, LoadingSchedule::default())
    }

    pub fn with_schedule(
        backend: Arc<B>,
        store: Arc<S>,
        latch: ResetLatch,
        schedule: LoadingSchedule,
    ) -> Self {
        Self {
            backend,
            identity: IdentityResolver::new(store),
            conversation: Mutex::new(ConversationCache::new()),
            history: Mutex::new(InputHistory::new()),
            loading: LoadingMachine::new(schedule),
            latch,
        }
    }

    /// Creates a session and applies the launch rules to the store.
    pub fn launch(backend: Arc<B>, store: Arc<S>, latch: ResetLatch, kind: LaunchKind) -> Self {
        let session = Self::new(backend, store, latch);
        session.identity.on_launch(kind);
        debug!(?kind, authenticated = session.identity().is_authenticated(), "Session launched");
        session
    }

    pub fn identity(&self) -> Identity {
        self.identity.resolve()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.conversation.lock().messages().to_vec()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.conversation.lock().id().map(String::from)
    }

    pub fn loading_state(&self) -> LoadingState {
        self.loading.state()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<LoadingState> {
        self.loading.subscribe()
    }

    pub fn reset_latch(&self) -> &ResetLatch {
        &self.latch
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().entries().to_vec()
    }

    pub fn history_cursor(&self) -> Option<usize> {
        self.history.lock().cursor()
    }

    /// Up key: returns the text to load into the composer, if any.
    pub fn history_up(&self, draft: &str) -> Option<String> {
        self.history.lock().up(draft).map(String::from)
    }

    /// Down key: returns the text to load into the composer, if any.
    pub fn history_down(&self) -> Option<String> {
        self.history.lock().down().map(String::from)
    }

    /// Sends `text` and returns the assistant message that answered it.
    ///
    /// Rejected without touching any state when the text is blank or another
    /// send is in flight. Every failure after that point becomes a fallback
    /// assistant message; the cycle always ends in `Done`.
    #[instrument(skip_all)]
    pub async fn send(&self, text: &str) -> Result<Message, SendRejected> {
        if text.trim().is_empty() {
            return Err(SendRejected::EmptyInput);
        }
        let cycle = self.loading.begin().ok_or(SendRejected::InFlight)?;

        let identity = self.identity.resolve();
        self.conversation.lock().push(Message::user(text));
        self.history.lock().push(text);

        let result = cycle.run(self.exchange(&identity, text)).await;

        let reply = match result {
            Ok(reply) => Message::assistant(reply.answer, reply.insight),
            Err(e) => {
                warn!(error = %e, "Send failed");
                Message::assistant(FALLBACK_REPLY, None)
            }
        };
        self.conversation.lock().push(reply.clone());
        cycle.finish();

        if identity.is_authenticated() {
            self.refresh_conversation().await;
        }

        Ok(reply)
    }

    /// The network half of a send: conversation creation if needed, the
    /// chat call, and adoption of any server-assigned ids.
    async fn exchange(&self, identity: &Identity, text: &str) -> Result<ChatReply, ApiError> {
        match identity {
            Identity::Authenticated { token } => {
                let active = self.conversation_id();
                if active.is_none() {
                    let created = self.backend.create_conversation(token).await?;
                    info!(id = %created.id, "Started conversation");
                    self.conversation.lock().set_id(created.id);
                }

                let reply = self.backend.send_authenticated(token, text).await?;
                if let Some(id) = &reply.conversation_id {
                    self.conversation.lock().set_id(id.clone());
                }
                Ok(reply)
            }
            Identity::Guest { guest_id } => {
                let reply = self.backend.send_guest(text, guest_id.as_deref()).await?;
                if guest_id.is_none() {
                    if let Some(id) = &reply.guest_id {
                        self.identity.adopt_guest_id(id);
                    }
                }
                Ok(reply)
            }
        }
    }

    /// Re-reads the active conversation and merges it into the local copy.
    /// Failures are logged and leave the cache untouched.
    async fn refresh_conversation(&self) {
        let (Some(token), Some(id)) = (self.identity.credential(), self.conversation_id()) else {
            return;
        };
        match self.backend.get_conversation(&token, &id).await {
            Ok(record) => self.conversation.lock().reconcile(record),
            Err(e) => warn!(conversation = %id, error = %e, "Failed to refresh conversation"),
        }
    }

    /// Selects a conversation and loads its messages. `None` clears the view.
    pub async fn open_conversation(&self, id: Option<&str>) -> Result<(), SessionError> {
        let Some(id) = id else {
            self.conversation.lock().reset();
            return Ok(());
        };
        let token = self
            .identity
            .credential()
            .ok_or(SessionError::NotAuthenticated)?;

        match self.backend.get_conversation(&token, id).await {
            Ok(record) => {
                debug!(conversation = %id, messages = record.messages.len(), "Loaded conversation");
                self.conversation.lock().load(record);
                Ok(())
            }
            Err(e) => {
                warn!(conversation = %id, error = %e, "Failed to load conversation");
                Err(e.into())
            }
        }
    }

    /// Starts a new conversation.
    ///
    /// Signed in: creates one on the backend and selects it. If that fails
    /// the selection is cleared and the client reset fires. As a guest this
    /// is [`new_guest_conversation`](Self::new_guest_conversation).
    pub async fn new_conversation(&self) -> Option<String> {
        let Some(token) = self.identity.credential() else {
            self.new_guest_conversation();
            return None;
        };
        self.identity.forget_guest();

        match self.backend.create_conversation(&token).await {
            Ok(record) => {
                let id = record.id.clone();
                self.conversation.lock().load(record);
                info!(conversation = %id, "Started conversation");
                Some(id)
            }
            Err(e) => {
                if e.is_unauthorized() {
                    warn!("Not authorized to create a conversation");
                } else {
                    warn!(error = %e, "Failed to create conversation");
                }
                self.conversation.lock().reset();
                self.latch.trigger();
                None
            }
        }
    }

    /// Forgets the guest conversation: stored id, messages and history.
    pub fn new_guest_conversation(&self) {
        self.identity.forget_guest();
        self.conversation.lock().reset();
        self.history.lock().clear();
        self.loading.reset();
        debug!("Started new guest conversation");
    }

    /// Signs in and switches to authenticated mode with no active
    /// conversation.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), SessionError> {
        let tokens = self.backend.login(username, password).await?;
        self.identity
            .sign_in(&tokens.access)
            .map_err(SessionError::store)?;
        self.conversation.lock().reset();
        Ok(())
    }

    /// Clears the credential and the displayed conversation.
    pub fn logout(&self) {
        self.identity.sign_out();
        self.conversation.lock().reset();
    }

    /// Creates an account and signs straight into it.
    pub async fn register(&self, username: &str, password: &str) -> Result<String, SessionError> {
        let notice = self.backend.register(username, password).await?;
        info!(username, "Registered account");
        self.login(username, password).await?;
        Ok(notice)
    }

    /// Asks the backend to mail a one-time code to the signed-in user.
    pub async fn request_verification(
        &self,
        details: &VerificationDetails,
    ) -> Result<String, SessionError> {
        let token = self
            .identity
            .credential()
            .ok_or(SessionError::NotAuthenticated)?;
        Ok(self.backend.request_verification(&token, details).await?)
    }

    /// Confirms the signed-in account with the mailed one-time code.
    pub async fn verify_otp(&self, code: &str) -> Result<VerifiedAccount, SessionError> {
        let token = self
            .identity
            .credential()
            .ok_or(SessionError::NotAuthenticated)?;
        let verified = self.backend.verify_otp(&token, code.trim()).await?;
        info!("Account verified");
        Ok(verified)
    }
}
