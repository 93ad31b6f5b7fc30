use axum::{
    extract::{Extension, Query},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{error, instrument, warn};

use super::{
    auth_error_response, internal_error,
    types::{ErrorResponse, OAuthCallbackParams},
};
use crate::auth::{AuthError, AuthService, OAuthCallbackError};

#[utoipa::path(
    get,
    path= "/auth/oauth/start",
    responses (
        (status = 307, description = "Redirect to the Google consent screen"),
        (status = 404, description = "OAuth is not configured", body = ErrorResponse),
    ),
    tag= "auth"
)]
#[instrument(skip(service))]
pub async fn oauth_start(service: Extension<Arc<AuthService>>) -> Response {
    match service.oauth_initiate().await {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(err) => auth_error_response(&err),
    }
}

#[utoipa::path(
    get,
    path= "/auth/oauth/callback",
    params(OAuthCallbackParams),
    responses (
        (status = 302, description = "Redirect to the frontend, with the session cookie on success or `error=invalid_state|oauth_failed` on failure"),
        (status = 404, description = "OAuth is not configured", body = ErrorResponse),
        (status = 500, description = "Account could not be resolved", body = ErrorResponse),
    ),
    tag= "auth"
)]
#[instrument(skip_all)]
pub async fn oauth_callback(
    service: Extension<Arc<AuthService>>,
    Query(params): Query<OAuthCallbackParams>,
) -> Response {
    if service.oauth().is_none() {
        return auth_error_response(&AuthError::OAuthDisabled);
    }

    if let Some(provider_error) = params.error.as_deref() {
        warn!("Provider reported an error: {}", provider_error);
    }

    match service
        .oauth_callback(params.state.as_deref(), params.code.as_deref())
        .await
    {
        Ok(session) => {
            let location = service.oauth_success_redirect(&session.user);
            match (
                HeaderValue::from_str(&location),
                HeaderValue::from_str(&service.session_cookie(&session.token)),
            ) {
                (Ok(location), Ok(cookie)) => (
                    StatusCode::FOUND,
                    [(LOCATION, location), (SET_COOKIE, cookie)],
                )
                    .into_response(),
                _ => {
                    error!("Failed to build oauth success redirect");
                    internal_error()
                }
            }
        }
        Err(err) => callback_error_response(&service, &err),
    }
}

fn callback_error_response(service: &AuthService, err: &OAuthCallbackError) -> Response {
    let Some(code) = err.redirect_code() else {
        error!("OAuth callback failed: {:#}", err);
        return internal_error();
    };

    match HeaderValue::from_str(&service.oauth_error_redirect(code)) {
        Ok(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
        Err(err) => {
            error!("Failed to build oauth error redirect: {}", err);
            internal_error()
        }
    }
}
