use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Feed unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    AccountExists,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Session token is invalid or expired")]
    InvalidToken,

    #[error("Auth service unavailable: {0}")]
    Unavailable(String),
}
