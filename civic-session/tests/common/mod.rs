//! Scripted in-memory backend shared by the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use civic_api::{
    ApiError, ChatBackend, ChatReply, ConversationRecord, ConversationSummary, LoginTokens,
    ReplyInsight, Sender, VerificationDetails, VerifiedAccount, WireMessage,
};
use parking_lot::Mutex;

pub const CONVERSATION_ID: &str = "conv-1";
pub const SERVER_GUEST_ID: &str = "guest-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Authenticated { message: String },
    Guest { message: String, guest_id: Option<String> },
    Create,
    Get { id: String },
    List,
    Search { query: String },
    Validate,
    Login { username: String },
    Register { username: String },
    RequestVerification { details: VerificationDetails },
    VerifyOtp { code: String },
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    reply_delay: Mutex<Duration>,
    fail_chat: Mutex<bool>,
    fail_create: Mutex<bool>,
    fail_search: Mutex<bool>,
    token_valid: Mutex<bool>,
    insight: Mutex<Option<ReplyInsight>>,
    search_delay: Mutex<Duration>,
    stored: Mutex<Vec<WireMessage>>,
}

fn server_error() -> ApiError {
    ApiError::Api {
        status: 500,
        message: "boom".to_string(),
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            token_valid: Mutex::new(true),
            search_delay: Mutex::new(Duration::from_millis(50)),
            ..Default::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        let backend = Self::new();
        *backend.reply_delay.lock() = delay;
        backend
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Search { query } => Some(query),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn fail_chat(&self, fail: bool) {
        *self.fail_chat.lock() = fail;
    }

    pub fn fail_create(&self, fail: bool) {
        *self.fail_create.lock() = fail;
    }

    pub fn fail_search(&self, fail: bool) {
        *self.fail_search.lock() = fail;
    }

    /// Attached to every chat reply from now on.
    pub fn set_insight(&self, insight: ReplyInsight) {
        *self.insight.lock() = Some(insight);
    }

    pub fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.lock() = delay;
    }

    pub fn set_token_valid(&self, valid: bool) {
        *self.token_valid.lock() = valid;
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    async fn answer(&self, message: &str) -> Result<String, ApiError> {
        let delay = *self.reply_delay.lock();
        tokio::time::sleep(delay).await;
        if *self.fail_chat.lock() {
            return Err(server_error());
        }
        Ok(format!("Answer to: {message}"))
    }
}

fn summary(id: String) -> ConversationSummary {
    ConversationSummary {
        id,
        title: None,
        updated_at: None,
    }
}

impl ChatBackend for FakeBackend {
    async fn send_authenticated(&self, _token: &str, message: &str) -> Result<ChatReply, ApiError> {
        self.record(Call::Authenticated {
            message: message.to_string(),
        });
        let answer = self.answer(message).await?;
        {
            let mut stored = self.stored.lock();
            stored.push(WireMessage {
                sender: Sender::User,
                text: message.to_string(),
                timestamp: None,
            });
            stored.push(WireMessage {
                sender: Sender::Assistant,
                text: answer.clone(),
                timestamp: None,
            });
        }
        Ok(ChatReply {
            answer,
            conversation_id: Some(CONVERSATION_ID.to_string()),
            guest_id: None,
            insight: self.insight.lock().clone(),
        })
    }

    async fn send_guest(&self, message: &str, guest_id: Option<&str>) -> Result<ChatReply, ApiError> {
        self.record(Call::Guest {
            message: message.to_string(),
            guest_id: guest_id.map(String::from),
        });
        let answer = self.answer(message).await?;
        Ok(ChatReply {
            answer,
            conversation_id: None,
            guest_id: Some(guest_id.unwrap_or(SERVER_GUEST_ID).to_string()),
            insight: self.insight.lock().clone(),
        })
    }

    async fn create_conversation(&self, _token: &str) -> Result<ConversationRecord, ApiError> {
        self.record(Call::Create);
        if *self.fail_create.lock() {
            return Err(ApiError::Api {
                status: 401,
                message: "Unauthorized".to_string(),
            });
        }
        Ok(ConversationRecord {
            id: CONVERSATION_ID.to_string(),
            messages: Vec::new(),
        })
    }

    async fn get_conversation(&self, _token: &str, id: &str) -> Result<ConversationRecord, ApiError> {
        self.record(Call::Get { id: id.to_string() });
        Ok(ConversationRecord {
            id: id.to_string(),
            messages: self.stored.lock().clone(),
        })
    }

    async fn list_conversations(&self, _token: &str) -> Result<Vec<ConversationSummary>, ApiError> {
        self.record(Call::List);
        Ok(vec![summary("default-1".to_string())])
    }

    async fn search_conversations(
        &self,
        _token: &str,
        query: &str,
    ) -> Result<Vec<ConversationSummary>, ApiError> {
        self.record(Call::Search {
            query: query.to_string(),
        });
        let delay = *self.search_delay.lock();
        tokio::time::sleep(delay).await;
        if *self.fail_search.lock() {
            return Err(server_error());
        }
        Ok(vec![summary(format!("hit-{query}"))])
    }

    async fn validate_token(&self, _token: &str) -> Result<bool, ApiError> {
        self.record(Call::Validate);
        Ok(*self.token_valid.lock())
    }

    async fn login(&self, username: &str, _password: &str) -> Result<LoginTokens, ApiError> {
        self.record(Call::Login {
            username: username.to_string(),
        });
        Ok(LoginTokens {
            access: "tok-new".to_string(),
            refresh: None,
        })
    }

    async fn register(&self, username: &str, _password: &str) -> Result<String, ApiError> {
        self.record(Call::Register {
            username: username.to_string(),
        });
        Ok("User created. Please request verification separately.".to_string())
    }

    async fn request_verification(
        &self,
        _token: &str,
        details: &VerificationDetails,
    ) -> Result<String, ApiError> {
        self.record(Call::RequestVerification {
            details: details.clone(),
        });
        Ok("OTP generated and will be sent via mail.".to_string())
    }

    async fn verify_otp(&self, _token: &str, code: &str) -> Result<VerifiedAccount, ApiError> {
        self.record(Call::VerifyOtp {
            code: code.to_string(),
        });
        if code != "123456" {
            return Err(ApiError::Api {
                status: 400,
                message: "Invalid OTP".to_string(),
            });
        }
        Ok(VerifiedAccount {
            message: "OTP verified successfully".to_string(),
            person_id: Some("42".to_string()),
        })
    }
}
