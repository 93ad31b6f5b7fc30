use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::{
    auth_error_response, internal_error, session_response,
    types::{ErrorResponse, UserResponse},
};
use crate::auth::{AuthError, AuthService, SESSION_COOKIE_NAME};

#[utoipa::path(
    get,
    path= "/auth/session",
    responses (
        (status = 200, description = "Current user; session cookie refreshed", body = UserResponse),
        (status = 401, description = "Missing, invalid or expired session", body = ErrorResponse),
    ),
    tag= "auth"
)]
#[instrument(skip(service, headers))]
pub async fn session(service: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let Some(token) = extract_session_token(&headers) else {
        return auth_error_response(&AuthError::Unauthorized);
    };

    match service.introspect(&token).await {
        Ok(session) => session_response(&service, StatusCode::OK, session),
        Err(err) => auth_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path= "/auth/logout",
    responses (
        (status = 204, description = "Session cookie cleared"),
    ),
    tag= "auth"
)]
#[instrument(skip(service))]
pub async fn logout(service: Extension<Arc<AuthService>>) -> Response {
    match HeaderValue::from_str(&service.logout()) {
        Ok(cookie) => (StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)]).into_response(),
        Err(err) => {
            error!("Failed to build logout cookie: {}", err);
            internal_error()
        }
    }
}

/// Session token from the bearer header, falling back to the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(*name, value);
            }
        }
        headers
    }

    #[test]
    fn token_from_cookie() {
        let headers = headers(&[("cookie", "theme=dark; session_token=abc.def.ghi; lang=en")]);
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("abc.def.ghi")
        );
    }

    #[test]
    fn token_from_bearer_wins() {
        let headers = headers(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "session_token=from-cookie"),
        ]);
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn missing_or_empty_token() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
        assert_eq!(
            extract_session_token(&headers(&[("cookie", "session_token=")])),
            None
        );
        assert_eq!(
            extract_session_token(&headers(&[("authorization", "Bearer   ")])),
            None
        );
        assert_eq!(
            extract_session_token(&headers(&[("cookie", "other_token=abc")])),
            None
        );
    }
}
