use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Sync engine is no longer running")]
    EngineClosed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message text must not be empty")]
    EmptyText,

    #[error("Message text too long: {len} bytes (max {max})")]
    TextTooLong { len: usize, max: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("Email and password must not be empty")]
    MissingField,

    #[error("Passwords do not match")]
    ConfirmationMismatch,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
}
