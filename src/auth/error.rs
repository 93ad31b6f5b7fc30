//! Error taxonomy surfaced by the auth service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("email already registered")]
    AlreadyRegistered,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired session")]
    Unauthorized,
    #[error("user not found")]
    UserNotFound,
    #[error("oauth is not configured")]
    OAuthDisabled,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Terminal failures of the OAuth callback.
#[derive(Debug, Error)]
pub enum OAuthCallbackError {
    #[error("invalid oauth state")]
    InvalidState,
    #[error("oauth exchange failed")]
    OAuthFailed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OAuthCallbackError {
    /// Short code carried in the error redirect, `None` for internal failures.
    #[must_use]
    pub fn redirect_code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidState => Some("invalid_state"),
            Self::OAuthFailed => Some("oauth_failed"),
            Self::Internal(_) => None,
        }
    }
}
