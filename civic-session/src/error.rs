use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("API error: {0}")]
    Api(#[from] civic_api::ApiError),

    #[error("Session store error: {0}")]
    Store(Box<dyn std::error::Error + Send + Sync>),

    #[error("Not signed in")]
    NotAuthenticated,
}

impl SessionError {
    pub(crate) fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        SessionError::Store(Box::new(err))
    }
}

/// Why a send did not start. A rejected send changes no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendRejected {
    #[error("Message is empty")]
    EmptyInput,

    #[error("A message is already being answered")]
    InFlight,
}
