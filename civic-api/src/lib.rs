//! HTTP client for the city-services chat backend.
//!
//! This crate owns the wire contract: request bodies, reply normalization and
//! the [`ChatBackend`] trait the session engine is generic over.
//!
//! # Example
//!
//! ```ignore
//! use civic_api::{ChatBackend, CivicClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = CivicClient::with_base_url("http://localhost:8000/api");
//!
//!     // First guest send: no guest id yet, the backend assigns one.
//!     let reply = client.send_guest("When is trash pickup?", None).await.unwrap();
//!     println!("{} (guest {:?})", reply.answer, reply.guest_id);
//! }
//! ```

mod backend;
mod client;
mod convert;
mod error;
mod types;

pub use backend::ChatBackend;
pub use client::{CivicClient, DEFAULT_BASE_URL};
pub use convert::{
    chat_body, guest_chat_body, otp_body, parse_chat_reply, parse_conversation, parse_summaries,
    parse_validation, parse_verified, verification_body,
};
pub use error::ApiError;
pub use types::{
    ChatReply, ConversationRecord, ConversationSummary, LoginTokens, ReplyInsight, Sender,
    VerificationDetails, VerifiedAccount, WireMessage,
};
