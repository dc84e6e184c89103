use std::sync::Arc;

use civic_session::{
    Identity, LaunchKind, LivenessPoller, LoadingState, Message, ResetLatch, SearchState,
    SendRejected,
};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::context::{AppContext, Search, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Composer,
    Search,
}

/// Result of an action that runs in the background and reports back.
enum Pending {
    /// A rejected send hands its text back.
    Send(oneshot::Receiver<Result<Message, (SendRejected, String)>>),
    Open(oneshot::Receiver<Result<(), String>>),
    NewConversation(oneshot::Receiver<Option<String>>),
}

pub struct ChatApp {
    pub focus: Focus,
    pub should_quit: bool,
    pub session: Arc<Session>,
    pub search: Search,
    pub search_rx: watch::Receiver<SearchState>,
    pub latch: ResetLatch,
    poller: Option<JoinHandle<()>>,
    pending: Vec<Pending>,
    pub input: String,
    pub cursor_pos: usize,
    pub search_input: String,
    pub selected: usize,
    pub messages_scroll: u16,
    pub last_error: Option<String>,
}

impl ChatApp {
    /// Builds the screen state for one client lifetime. A reset tears this
    /// down and calls `start` again with [`LaunchKind::Reload`].
    pub async fn start(ctx: &AppContext, kind: LaunchKind, open: Option<String>) -> Self {
        let latch = ResetLatch::new();
        let session = Arc::new(ctx.session(latch.clone(), kind));
        let search = ctx.search();
        let search_rx = search.subscribe();

        let poller = LivenessPoller::new(
            Arc::clone(&ctx.client),
            Arc::clone(&ctx.store),
            latch.clone(),
        )
        .spawn();

        let mut app = Self {
            focus: Focus::Composer,
            should_quit: false,
            session,
            search,
            search_rx,
            latch,
            poller,
            pending: Vec::new(),
            input: String::new(),
            cursor_pos: 0,
            search_input: String::new(),
            selected: 0,
            messages_scroll: 0,
            last_error: None,
        };

        if app.is_authenticated() {
            app.search.refresh_default().await;
            if let Some(id) = open {
                if let Err(e) = app.session.open_conversation(Some(id.as_str())).await {
                    app.last_error = Some(format!("Could not open {}: {}", id, e));
                }
            }
        } else if open.is_some() {
            app.last_error = Some("Sign in to open saved conversations".to_string());
        }

        app
    }

    pub fn identity(&self) -> Identity {
        self.session.identity()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_authenticated()
    }

    pub fn loading(&self) -> LoadingState {
        self.session.loading_state()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.session.messages()
    }

    pub fn search_state(&self) -> SearchState {
        self.search_rx.borrow().clone()
    }

    pub fn reset_requested(&self) -> bool {
        self.latch.is_triggered()
    }

    pub fn is_sending(&self) -> bool {
        self.pending.iter().any(|p| matches!(p, Pending::Send(_)))
    }

    pub fn send_message(&mut self) {
        if self.input.trim().is_empty() || self.is_sending() {
            return;
        }
        let text = std::mem::take(&mut self.input);
        self.cursor_pos = 0;

        let (tx, rx) = oneshot::channel();
        let session = Arc::clone(&self.session);
        tokio::spawn(async move {
            let result = session.send(&text).await;
            let _ = tx.send(result.map_err(|e| (e, text)));
        });

        self.pending.push(Pending::Send(rx));
        self.last_error = None;
        self.messages_scroll = 0;
    }

    pub fn new_conversation(&mut self) {
        let (tx, rx) = oneshot::channel();
        let session = Arc::clone(&self.session);
        tokio::spawn(async move {
            let _ = tx.send(session.new_conversation().await);
        });
        self.pending.push(Pending::NewConversation(rx));
        self.input.clear();
        self.cursor_pos = 0;
        self.messages_scroll = 0;
    }

    pub fn open_selected(&mut self) {
        let Some(id) = self
            .search_state()
            .conversations
            .get(self.selected)
            .map(|c| c.id.clone())
        else {
            return;
        };

        let (tx, rx) = oneshot::channel();
        let session = Arc::clone(&self.session);
        tokio::spawn(async move {
            let result = session
                .open_conversation(Some(id.as_str()))
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(result);
        });
        self.pending.push(Pending::Open(rx));
        self.focus = Focus::Composer;
        self.messages_scroll = 0;
    }

    /// Collects results of background actions without blocking.
    pub fn poll_pending(&mut self) {
        let mut refresh_list = false;
        let mut still_pending = Vec::with_capacity(self.pending.len());

        for pending in std::mem::take(&mut self.pending) {
            match pending {
                Pending::Send(mut rx) => match rx.try_recv() {
                    Ok(Ok(_)) => {
                        // A first authenticated send creates a conversation.
                        refresh_list |= self.search_input.is_empty();
                    }
                    Ok(Err((e, text))) => {
                        if self.input.is_empty() {
                            self.cursor_pos = text.len();
                            self.input = text;
                        }
                        self.last_error = Some(e.to_string());
                    }
                    Err(oneshot::error::TryRecvError::Empty) => {
                        still_pending.push(Pending::Send(rx))
                    }
                    Err(oneshot::error::TryRecvError::Closed) => {
                        self.last_error = Some("Request cancelled".to_string())
                    }
                },
                Pending::Open(mut rx) => match rx.try_recv() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => self.last_error = Some(e),
                    Err(oneshot::error::TryRecvError::Empty) => {
                        still_pending.push(Pending::Open(rx))
                    }
                    Err(oneshot::error::TryRecvError::Closed) => {}
                },
                Pending::NewConversation(mut rx) => match rx.try_recv() {
                    Ok(Some(id)) => {
                        info!(conversation = %id, "Switched to new conversation");
                        refresh_list = true;
                    }
                    Ok(None) => {}
                    Err(oneshot::error::TryRecvError::Empty) => {
                        still_pending.push(Pending::NewConversation(rx))
                    }
                    Err(oneshot::error::TryRecvError::Closed) => {}
                },
            }
        }

        self.pending = still_pending;

        if refresh_list && self.is_authenticated() {
            self.search.on_query_change(self.search_input.clone());
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Composer => Focus::Search,
            Focus::Search => Focus::Composer,
        };
    }

    pub fn history_up(&mut self) {
        if let Some(text) = self.session.history_up(&self.input) {
            self.cursor_pos = text.len();
            self.input = text;
        }
    }

    pub fn history_down(&mut self) {
        if let Some(text) = self.session.history_down() {
            self.cursor_pos = text.len();
            self.input = text;
        }
    }

    pub fn select_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_down(&mut self) {
        let len = self.search_rx.borrow().conversations.len();
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn search_char(&mut self, c: char) {
        self.search_input.push(c);
        self.search_changed();
    }

    pub fn search_backspace(&mut self) {
        if self.search_input.pop().is_some() {
            self.search_changed();
        }
    }

    fn search_changed(&mut self) {
        self.selected = 0;
        if self.is_authenticated() {
            self.search.on_query_change(self.search_input.clone());
        }
    }

    pub fn scroll_up(&mut self) {
        self.messages_scroll = self.messages_scroll.saturating_add(1);
    }

    pub fn scroll_down(&mut self) {
        self.messages_scroll = self.messages_scroll.saturating_sub(1);
    }

    pub fn input_char(&mut self, c: char) {
        self.input.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }

    pub fn input_backspace(&mut self) {
        if self.cursor_pos > 0 {
            let prev_char_boundary = self.input[..self.cursor_pos]
                .char_indices()
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.input.remove(prev_char_boundary);
            self.cursor_pos = prev_char_boundary;
        }
    }

    pub fn input_delete(&mut self) {
        if self.cursor_pos < self.input.len() {
            self.input.remove(self.cursor_pos);
        }
    }

    pub fn input_left(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos = self.input[..self.cursor_pos]
                .char_indices()
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(0);
        }
    }

    pub fn input_right(&mut self) {
        if self.cursor_pos < self.input.len() {
            self.cursor_pos = self.input[self.cursor_pos..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| self.cursor_pos + i)
                .unwrap_or(self.input.len());
        }
    }

    pub fn input_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn input_end(&mut self) {
        self.cursor_pos = self.input.len();
    }
}

impl Drop for ChatApp {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        if self.latch.is_triggered() {
            warn!("Session reset, relaunching");
        }
    }
}
