use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "bot")]
    Assistant,
}

/// Extra analysis the backend may attach to an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyInsight {
    pub insight: Option<String>,
    pub categories: Vec<String>,
    pub sentiment: Option<String>,
    pub emotion: Option<String>,
}

impl ReplyInsight {
    pub fn is_empty(&self) -> bool {
        self.insight.is_none()
            && self.categories.is_empty()
            && self.sentiment.is_none()
            && self.emotion.is_none()
    }
}

/// Normalized reply from either chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub answer: String,
    /// Server-assigned conversation id (authenticated chat).
    pub conversation_id: Option<String>,
    /// Server-assigned guest id (guest chat).
    pub guest_id: Option<String>,
    pub insight: Option<ReplyInsight>,
}

/// A message as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub sender: Sender,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A full conversation as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub id: String,
    pub messages: Vec<WireMessage>,
}

/// A conversation entry in the default list or in search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Credentials issued by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginTokens {
    pub access: String,
    pub refresh: Option<String>,
}

/// Contact and postal details sent with a verification request. Fields left
/// as `None` are not sent and keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationDetails {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

/// Result of a successful one-time code check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAccount {
    pub message: String,
    pub person_id: Option<String>,
}
