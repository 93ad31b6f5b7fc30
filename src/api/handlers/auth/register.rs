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
    path= "/auth/register",
    request_body = Credentials,
    responses (
        (status = 201, description = "Account created; session cookie set", body = UserResponse),
        (status = 400, description = "Missing or invalid email or password", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    ),
    tag= "auth"
)]
#[instrument(skip(service, payload))]
pub async fn register(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<Credentials>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };

    match service.register(&request.email, &request.password).await {
        Ok(session) => session_response(&service, StatusCode::CREATED, session),
        Err(err) => auth_error_response(&err),
    }
}
