use oauth2::{
    basic::{BasicClient, BasicErrorResponse},
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, HttpClientError, RedirectUrl, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use reqwest::{redirect::Policy, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{OAuthProvider, ProviderError, ProviderFuture, ProviderProfile};
use crate::APP_USER_AGENT;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    client_id: String,
    client_secret: SecretString,
    redirect_url: Url,
    auth_url: Url,
    token_url: Url,
    userinfo_url: Url,
    timeout: Duration,
}

impl GoogleConfig {
    /// # Errors
    /// Returns an error if one of the built-in Google endpoints fails to parse.
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        redirect_url: Url,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client_id,
            client_secret,
            redirect_url,
            auth_url: Url::parse(GOOGLE_AUTH_URL)?,
            token_url: Url::parse(GOOGLE_TOKEN_URL)?,
            userinfo_url: Url::parse(GOOGLE_USERINFO_URL)?,
            timeout: DEFAULT_HTTP_TIMEOUT,
        })
    }

    /// Point the provider at other endpoints, e.g. a local mock server.
    #[must_use]
    pub fn with_endpoints(mut self, auth_url: Url, token_url: Url, userinfo_url: Url) -> Self {
        self.auth_url = auth_url;
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// `oauth2` client with the authorization and token endpoints set.
type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Deserialize)]
struct GoogleUser {
    id: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    oauth: ConfiguredClient,
    userinfo_url: Url,
    client: Client,
}

impl GoogleProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GoogleConfig) -> Result<Self, ProviderError> {
        // Redirects stay off so the token endpoint cannot bounce the code elsewhere.
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .redirect(Policy::none())
            .build()?;

        // Credentials travel in the form body, as Google documents for web apps.
        let oauth = BasicClient::new(ClientId::new(config.client_id))
            .set_client_secret(ClientSecret::new(
                config.client_secret.expose_secret().to_string(),
            ))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(AuthUrl::from_url(config.auth_url))
            .set_token_uri(TokenUrl::from_url(config.token_url))
            .set_redirect_uri(RedirectUrl::from_url(config.redirect_url));

        Ok(Self {
            oauth,
            userinfo_url: config.userinfo_url,
            client,
        })
    }
}

fn exchange_error(
    err: RequestTokenError<HttpClientError<reqwest::Error>, BasicErrorResponse>,
) -> ProviderError {
    match err {
        RequestTokenError::Request(HttpClientError::Reqwest(err)) => ProviderError::Request(*err),
        RequestTokenError::ServerResponse(response) => {
            ProviderError::Rejected(response.to_string())
        }
        other => ProviderError::InvalidResponse(other.to_string()),
    }
}

impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> Url {
        let (url, _) = self
            .oauth
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scopes(SCOPES.iter().map(|scope| Scope::new((*scope).to_string())))
            .add_extra_param("access_type", "offline")
            .url();
        url
    }

    fn exchange_code<'a>(&'a self, code: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let token = self
                .oauth
                .exchange_code(AuthorizationCode::new(code.to_string()))
                .request_async(&self.client)
                .await
                .map_err(exchange_error)?;

            let access_token = token.access_token().secret();
            if access_token.is_empty() {
                return Err(ProviderError::InvalidResponse(
                    "empty access token".to_string(),
                ));
            }

            debug!("Exchanged authorization code");

            Ok(access_token.clone())
        })
    }

    fn fetch_profile<'a>(&'a self, access_token: &'a str) -> ProviderFuture<'a, ProviderProfile> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.userinfo_url.clone())
                .bearer_auth(access_token)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(ProviderError::Status(status.as_u16()));
            }

            let user: GoogleUser = response.json().await?;
            if user.id.is_empty() || user.email.is_empty() {
                return Err(ProviderError::InvalidResponse(
                    "profile without id or email".to_string(),
                ));
            }

            Ok(ProviderProfile {
                id: user.id,
                email: user.email,
            })
        })
    }
}
