use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::types::{
    ChatReply, ConversationRecord, ConversationSummary, LoginTokens, ReplyInsight, Sender,
    VerificationDetails, VerifiedAccount, WireMessage,
};

/// Builds the body for the authenticated chat endpoint.
pub fn chat_body(message: &str) -> Value {
    json!({ "message": message })
}

/// Builds the body for the guest chat endpoint.
///
/// `guestId` is omitted entirely on the first guest send.
pub fn guest_chat_body(message: &str, guest_id: Option<&str>) -> Value {
    let mut body = json!({ "message": message });
    if let Some(id) = guest_id {
        body["guestId"] = json!(id);
    }
    body
}

pub fn login_body(username: &str, password: &str) -> Value {
    json!({ "username": username, "password": password })
}

/// Body for a verification request. Only the fields that are set are sent.
pub fn verification_body(details: &VerificationDetails) -> Value {
    let fields = [
        ("email", &details.email),
        ("first_name", &details.first_name),
        ("last_name", &details.last_name),
        ("address_line1", &details.address_line1),
        ("address_line2", &details.address_line2),
        ("city", &details.city),
        ("state", &details.state),
        ("zip_code", &details.zip_code),
    ];

    let mut body = json!({});
    for (key, value) in fields {
        if let Some(value) = value {
            body[key] = json!(value);
        }
    }
    body
}

pub fn otp_body(code: &str) -> Value {
    json!({ "otp": code })
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

fn id_field(value: &Value) -> Option<String> {
    str_field(value, "_id")
        .or_else(|| str_field(value, "id"))
        .map(String::from)
}

fn timestamp_field(value: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|k| str_field(value, k))
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Extracts the human-readable message from an error body.
pub fn error_message(body: &Value) -> String {
    ["error", "message", "detail"]
        .iter()
        .find_map(|k| str_field(body, k))
        .unwrap_or("Unknown error")
        .to_string()
}

/// Parses a reply from either chat endpoint.
///
/// `answer` is the canonical field. `chatbotResponse` is still accepted from
/// older backends but only when `answer` is absent.
pub fn parse_chat_reply(response: &Value) -> Result<ChatReply, ApiError> {
    let answer = match str_field(response, "answer") {
        Some(a) => a.to_string(),
        None => {
            let legacy = str_field(response, "chatbotResponse")
                .ok_or(ApiError::MissingField("answer"))?;
            debug!("Reply used deprecated chatbotResponse field");
            legacy.to_string()
        }
    };

    let label = |key: &str| {
        response
            .get(key)
            .and_then(|v| v.get("label"))
            .and_then(|l| l.as_str())
            .map(String::from)
    };

    let insight = ReplyInsight {
        insight: str_field(response, "insight").map(String::from),
        categories: response
            .get("categories")
            .and_then(|c| c.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| c.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
        sentiment: label("question_sentiment"),
        emotion: label("question_emotion"),
    };

    Ok(ChatReply {
        answer,
        conversation_id: str_field(response, "conversationId").map(String::from),
        guest_id: str_field(response, "guestId").map(String::from),
        insight: (!insight.is_empty()).then_some(insight),
    })
}

fn parse_message(value: &Value) -> Option<WireMessage> {
    let sender: Sender = serde_json::from_value(value.get("sender")?.clone()).ok()?;
    let text = str_field(value, "text")?;
    if text.is_empty() {
        return None;
    }
    Some(WireMessage {
        sender,
        text: text.to_string(),
        timestamp: timestamp_field(value, &["timestamp"]),
    })
}

/// Parses a conversation document. Messages without a sender or text are skipped.
pub fn parse_conversation(response: &Value) -> Result<ConversationRecord, ApiError> {
    let id = id_field(response).ok_or(ApiError::MissingField("_id"))?;

    let messages = response
        .get("messages")
        .and_then(|m| m.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|m| {
                    let parsed = parse_message(m);
                    if parsed.is_none() {
                        debug!(conversation = %id, "Skipping unreadable message");
                    }
                    parsed
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ConversationRecord { id, messages })
}

/// Parses a conversation list, either a bare array or wrapped in
/// `conversations` / `results`.
pub fn parse_summaries(response: &Value) -> Result<Vec<ConversationSummary>, ApiError> {
    let items = response
        .as_array()
        .or_else(|| response.get("conversations").and_then(|c| c.as_array()))
        .or_else(|| response.get("results").and_then(|c| c.as_array()))
        .ok_or(ApiError::MissingField("conversations"))?;

    Ok(items
        .iter()
        .filter_map(|item| {
            Some(ConversationSummary {
                id: id_field(item)?,
                title: str_field(item, "title")
                    .or_else(|| str_field(item, "name"))
                    .map(String::from),
                updated_at: timestamp_field(item, &["updatedAt", "updated_at"]),
            })
        })
        .collect())
}

/// Reads the validity signal from the token check endpoint.
pub fn parse_validation(response: &Value) -> Result<bool, ApiError> {
    if let Some(valid) = response.as_bool() {
        return Ok(valid);
    }
    response
        .get("valid")
        .or_else(|| response.get("isValid"))
        .and_then(|v| v.as_bool())
        .ok_or(ApiError::MissingField("valid"))
}

pub fn parse_login(response: &Value) -> Result<LoginTokens, ApiError> {
    let access = str_field(response, "access")
        .or_else(|| str_field(response, "access_token"))
        .or_else(|| str_field(response, "token"))
        .ok_or(ApiError::MissingField("access"))?;

    Ok(LoginTokens {
        access: access.to_string(),
        refresh: str_field(response, "refresh").map(String::from),
    })
}

/// Reads the confirmation text the account endpoints return.
pub fn parse_notice(response: &Value) -> String {
    str_field(response, "message").unwrap_or("OK").to_string()
}

pub fn parse_verified(response: &Value) -> Result<VerifiedAccount, ApiError> {
    let person_id = match response.get("person_id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };

    Ok(VerifiedAccount {
        message: parse_notice(response),
        person_id,
    })
}
