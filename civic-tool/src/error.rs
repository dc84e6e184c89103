use thiserror::Error;

#[derive(Debug, Error)]
pub enum CivError {
    #[error("Password not given. Pass --password or set CIVIC_PASSWORD")]
    PasswordNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session store error: {0}")]
    Store(#[from] civic_session::SessionStoreError),

    #[error("Session error: {0}")]
    Session(#[from] civic_session::SessionError),

    #[error("API error: {0}")]
    Api(#[from] civic_api::ApiError),
}
