//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::UserDetails;

/// Email/password pair for register and login. Missing fields read as empty.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub user: UserDetails,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct OAuthCallbackParams {
    /// Anti-forgery state minted by `/auth/oauth/start`.
    pub state: Option<String>,
    /// Authorization code issued by the provider.
    pub code: Option<String>,
    /// Error reported by the provider, e.g. `access_denied`.
    pub error: Option<String>,
}
