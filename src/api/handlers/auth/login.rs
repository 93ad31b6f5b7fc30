use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::instrument;

use super::{
    auth_error_response, error_response, session_response,
    types::{Credentials, ErrorResponse, UserResponse},
};
use crate::auth::AuthService;

#[utoipa::path(
    post,
    path= "/auth/login",
    request_body = Credentials,
    responses (
        (status = 200, description = "Signed in; session cookie set", body = UserResponse),
        (status = 400, description = "Missing email or password", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    ),
    tag= "auth"
)]
#[instrument(skip(service, payload))]
pub async fn login(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<Credentials>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };

    match service.login(&request.email, &request.password).await {
        Ok(session) => session_response(&service, StatusCode::OK, session),
        Err(err) => auth_error_response(&err),
    }
}
