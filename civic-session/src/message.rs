use chrono::{DateTime, Utc};
use civic_api::{ReplyInsight, Sender, WireMessage};

/// Where a message in the local cache came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Appended optimistically by this client.
    Local,
    /// Read back from the backend.
    Confirmed,
}

/// A chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sender: Sender,
    text: String,
    timestamp: DateTime<Utc>,
    provenance: Provenance,
    insight: Option<ReplyInsight>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            timestamp: Utc::now(),
            provenance: Provenance::Local,
            insight: None,
        }
    }

    pub fn assistant(text: impl Into<String>, insight: Option<ReplyInsight>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
            provenance: Provenance::Local,
            insight,
        }
    }

    /// Wraps a server copy. Missing timestamps fall back to the read time.
    pub fn confirmed(wire: WireMessage) -> Self {
        Self {
            sender: wire.sender,
            text: wire.text,
            timestamp: wire.timestamp.unwrap_or_else(Utc::now),
            provenance: Provenance::Confirmed,
            insight: None,
        }
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn insight(&self) -> Option<&ReplyInsight> {
        self.insight.as_ref()
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// Copies fields the server does not store from an earlier copy of the
    /// same message.
    pub(crate) fn carry_over(&mut self, earlier: &Message) {
        if self.insight.is_none() {
            self.insight.clone_from(&earlier.insight);
        }
    }

    /// Same author and text, ignoring timestamps and provenance.
    pub fn same_content(&self, other: &Message) -> bool {
        self.sender == other.sender && self.text == other.text
    }
}
