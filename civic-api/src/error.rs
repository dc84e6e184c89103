use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Missing field in response: {0}")]
    MissingField(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// True when the backend rejected the bearer credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Api { status: 401 | 403, .. })
    }
}
