//! Auth core errors

use folio_shared::StoreError;

use super::password::{PasswordError, PasswordValidationError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password; the two are never distinguished
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Missing, malformed, unknown or expired session token
    #[error("Invalid or expired session")]
    InvalidSession,

    /// Unknown or expired invite token
    #[error("Invalid or expired invite")]
    InvalidInvite,

    #[error("Invite has already been used")]
    InviteAlreadyUsed,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("User already has a password login")]
    LoginAlreadyExists,

    #[error(transparent)]
    WeakPassword(#[from] PasswordValidationError),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AuthResult<T> = Result<T, AuthError>;
