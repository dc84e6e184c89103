use std::future::Future;

use crate::error::ApiError;
use crate::types::{
    ChatReply, ConversationRecord, ConversationSummary, LoginTokens, VerificationDetails,
    VerifiedAccount,
};

/// The remote city-services API as seen by the session engine.
///
/// Implemented over HTTP by [`CivicClient`](crate::CivicClient); tests provide
/// scripted in-memory implementations. Methods that take a `token` send it as
/// a bearer credential.
pub trait ChatBackend: Send + Sync {
    fn send_authenticated(
        &self,
        token: &str,
        message: &str,
    ) -> impl Future<Output = Result<ChatReply, ApiError>> + Send;

    /// `guest_id` is `None` on the first guest send; the reply carries the
    /// id the backend assigned.
    fn send_guest(
        &self,
        message: &str,
        guest_id: Option<&str>,
    ) -> impl Future<Output = Result<ChatReply, ApiError>> + Send;

    fn create_conversation(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ConversationRecord, ApiError>> + Send;

    fn get_conversation(
        &self,
        token: &str,
        id: &str,
    ) -> impl Future<Output = Result<ConversationRecord, ApiError>> + Send;

    /// The default conversation list shown when no search is active.
    fn list_conversations(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, ApiError>> + Send;

    fn search_conversations(
        &self,
        token: &str,
        query: &str,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, ApiError>> + Send;

    /// `Ok(false)` when the backend reports the credential as invalid or
    /// rejects it outright.
    fn validate_token(&self, token: &str) -> impl Future<Output = Result<bool, ApiError>> + Send;

    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<LoginTokens, ApiError>> + Send;

    /// Creates an account. Returns the backend's confirmation text; the new
    /// account is not signed in.
    fn register(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;

    /// Asks for a one-time code to be mailed to the signed-in user, updating
    /// any contact details given.
    fn request_verification(
        &self,
        token: &str,
        details: &VerificationDetails,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;

    fn verify_otp(
        &self,
        token: &str,
        code: &str,
    ) -> impl Future<Output = Result<VerifiedAccount, ApiError>> + Send;
}
