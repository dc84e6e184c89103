use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::backend::ChatBackend;
use crate::convert::{
    chat_body, error_message, guest_chat_body, login_body, otp_body, parse_chat_reply,
    parse_conversation, parse_login, parse_notice, parse_summaries, parse_validation,
    parse_verified, verification_body,
};
use crate::error::ApiError;
use crate::types::{
    ChatReply, ConversationRecord, ConversationSummary, LoginTokens, VerificationDetails,
    VerifiedAccount,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// HTTP client for the city-services chat API.
#[derive(Debug, Clone)]
pub struct CivicClient {
    http: reqwest::Client,
    base_url: String,
}

impl CivicClient {
    /// Creates a client against the default local backend.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL. A trailing slash is ignored.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the request and returns the JSON body of a successful response.
    async fn execute(&self, builder: RequestBuilder) -> Result<Value, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(response.json().await?)
    }
}

impl Default for CivicClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatBackend for CivicClient {
    #[instrument(skip_all)]
    async fn send_authenticated(&self, token: &str, message: &str) -> Result<ChatReply, ApiError> {
        debug!("Sending authenticated chat message");
        let body = self
            .execute(
                self.request(Method::POST, "/chat/auth", Some(token))
                    .json(&chat_body(message)),
            )
            .await?;
        parse_chat_reply(&body)
    }

    #[instrument(skip(self, message), fields(first_send = guest_id.is_none()))]
    async fn send_guest(&self, message: &str, guest_id: Option<&str>) -> Result<ChatReply, ApiError> {
        debug!("Sending guest chat message");
        let body = self
            .execute(
                self.request(Method::POST, "/chat/guest", None)
                    .json(&guest_chat_body(message, guest_id)),
            )
            .await?;
        parse_chat_reply(&body)
    }

    #[instrument(skip_all)]
    async fn create_conversation(&self, token: &str) -> Result<ConversationRecord, ApiError> {
        let body = self
            .execute(self.request(Method::POST, "/conversation", Some(token)))
            .await?;
        let record = parse_conversation(&body)?;
        debug!(id = %record.id, "Created conversation");
        Ok(record)
    }

    #[instrument(skip(self, token))]
    async fn get_conversation(&self, token: &str, id: &str) -> Result<ConversationRecord, ApiError> {
        let body = self
            .execute(self.request(Method::GET, &format!("/conversation/{id}"), Some(token)))
            .await?;
        parse_conversation(&body)
    }

    #[instrument(skip_all)]
    async fn list_conversations(&self, token: &str) -> Result<Vec<ConversationSummary>, ApiError> {
        let body = self
            .execute(self.request(Method::GET, "/conversations", Some(token)))
            .await?;
        parse_summaries(&body)
    }

    #[instrument(skip(self, token))]
    async fn search_conversations(
        &self,
        token: &str,
        query: &str,
    ) -> Result<Vec<ConversationSummary>, ApiError> {
        let body = self
            .execute(
                self.request(Method::GET, "/conversation/search", Some(token))
                    .query(&[("q", query)]),
            )
            .await?;
        parse_summaries(&body)
    }

    #[instrument(skip_all)]
    async fn validate_token(&self, token: &str) -> Result<bool, ApiError> {
        match self
            .execute(self.request(Method::GET, "/token/validate", Some(token)))
            .await
        {
            Ok(body) => parse_validation(&body),
            Err(e) if e.is_unauthorized() => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> Result<LoginTokens, ApiError> {
        let body = self
            .execute(
                self.request(Method::POST, "/auth/login", None)
                    .json(&login_body(username, password)),
            )
            .await?;
        parse_login(&body)
    }

    #[instrument(skip(self, password))]
    async fn register(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let body = self
            .execute(
                self.request(Method::POST, "/auth/register", None)
                    .json(&login_body(username, password)),
            )
            .await?;
        Ok(parse_notice(&body))
    }

    #[instrument(skip_all)]
    async fn request_verification(
        &self,
        token: &str,
        details: &VerificationDetails,
    ) -> Result<String, ApiError> {
        let body = self
            .execute(
                self.request(Method::POST, "/auth/request-verification", Some(token))
                    .json(&verification_body(details)),
            )
            .await?;
        Ok(parse_notice(&body))
    }

    #[instrument(skip_all)]
    async fn verify_otp(&self, token: &str, code: &str) -> Result<VerifiedAccount, ApiError> {
        let body = self
            .execute(
                self.request(Method::POST, "/auth/verify-otp", Some(token))
                    .json(&otp_body(code)),
            )
            .await?;
        let verified = parse_verified(&body)?;
        debug!(person_id = ?verified.person_id, "Account verified");
        Ok(verified)
    }
}
