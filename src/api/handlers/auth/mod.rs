//! Auth endpoints: register, login, Google OAuth, session introspection and logout.
//!
//! Successful sign-ins set the session cookie and return `{"user": ...}`; errors
//! are `{"error": "..."}`. Internal failures are logged and answered with a
//! generic message.

pub mod login;
pub mod oauth;
pub mod register;
pub mod session;
pub mod types;


use axum::{
    http::{header::SET_COOKIE, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::error;

use crate::auth::{AuthError, AuthService, AuthSession};
use types::{ErrorResponse, UserResponse};

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

pub(crate) fn internal_error() -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

pub(crate) fn auth_error_response(err: &AuthError) -> Response {
    match err {
        AuthError::Validation(message) => error_response(StatusCode::BAD_REQUEST, message.clone()),
        AuthError::AlreadyRegistered => error_response(StatusCode::CONFLICT, err.to_string()),
        AuthError::InvalidCredentials => error_response(StatusCode::UNAUTHORIZED, err.to_string()),
        AuthError::Unauthorized | AuthError::UserNotFound => error_response(
            StatusCode::UNAUTHORIZED,
            AuthError::Unauthorized.to_string(),
        ),
        AuthError::OAuthDisabled => error_response(StatusCode::NOT_FOUND, err.to_string()),
        AuthError::Internal(source) => {
            error!("Auth request failed: {:#}", source);
            internal_error()
        }
    }
}

/// Answer with the user and a `Set-Cookie` carrying the session token.
pub(crate) fn session_response(
    service: &AuthService,
    status: StatusCode,
    session: AuthSession,
) -> Response {
    match HeaderValue::from_str(&service.session_cookie(&session.token)) {
        Ok(cookie) => (
            status,
            [(SET_COOKIE, cookie)],
            Json(UserResponse { user: session.user }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to build session cookie: {}", err);
            internal_error()
        }
    }
}
