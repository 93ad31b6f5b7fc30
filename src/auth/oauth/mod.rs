//! OAuth2 authorization-code flow.
//!
//! [`OAuthFlow`] owns the provider handle and the state store. `initiate` mints a
//! state and returns the provider URL to redirect to; `authenticate` checks the
//! returned state before any network traffic, then trades the code for an access
//! token and fetches the remote profile. Account linking is left to the service.

use std::{future::Future, pin::Pin, sync::Arc};
use thiserror::Error;
use tracing::{error, instrument, warn};
use url::Url;

use super::{error::OAuthCallbackError, state::OAuthStateStore};

mod google;

pub use google::{GoogleConfig, GoogleProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider responded with status {0}")]
    Status(u16),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Identity returned by the provider's profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub id: String,
    pub email: String,
}

pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

pub trait OAuthProvider: Send + Sync {
    /// Value stored in `users.oauth_provider`.
    fn name(&self) -> &str;

    fn authorization_url(&self, state: &str) -> Url;

    /// Trade an authorization code for an access token.
    fn exchange_code<'a>(&'a self, code: &'a str) -> ProviderFuture<'a, String>;

    fn fetch_profile<'a>(&'a self, access_token: &'a str) -> ProviderFuture<'a, ProviderProfile>;
}

#[derive(Clone)]
pub struct OAuthFlow {
    provider: Arc<dyn OAuthProvider>,
    states: Arc<OAuthStateStore>,
}

impl std::fmt::Debug for OAuthFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthFlow")
            .field("provider", &self.provider.name())
            .field("states", &self.states)
            .finish()
    }
}

impl OAuthFlow {
    #[must_use]
    pub fn new(provider: Arc<dyn OAuthProvider>, states: Arc<OAuthStateStore>) -> Self {
        Self { provider, states }
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    #[must_use]
    pub fn states(&self) -> &Arc<OAuthStateStore> {
        &self.states
    }

    /// Record a fresh state and build the provider redirect URL.
    ///
    /// # Errors
    /// Returns an error if the state cannot be generated.
    pub async fn initiate(&self) -> anyhow::Result<Url> {
        let state = self.states.generate().await?;
        Ok(self.provider.authorization_url(&state))
    }

    /// Validate the callback and resolve the remote identity.
    ///
    /// # Errors
    /// [`OAuthCallbackError::InvalidState`] when the state is missing, unknown,
    /// reused or expired; [`OAuthCallbackError::OAuthFailed`] when the code is
    /// missing or the provider calls fail.
    #[instrument(skip_all, fields(provider = %self.provider.name()))]
    pub async fn authenticate(
        &self,
        state: Option<&str>,
        code: Option<&str>,
    ) -> Result<ProviderProfile, OAuthCallbackError> {
        let Some(state) = state.filter(|state| !state.is_empty()) else {
            warn!("OAuth callback without state");
            return Err(OAuthCallbackError::InvalidState);
        };

        if !self.states.validate(state).await {
            warn!("OAuth callback with invalid state");
            return Err(OAuthCallbackError::InvalidState);
        }

        let Some(code) = code.filter(|code| !code.is_empty()) else {
            warn!("OAuth callback without code");
            return Err(OAuthCallbackError::OAuthFailed);
        };

        let access_token = self.provider.exchange_code(code).await.map_err(|err| {
            error!("Failed to exchange authorization code: {}", err);
            OAuthCallbackError::OAuthFailed
        })?;

        self.provider
            .fetch_profile(&access_token)
            .await
            .map_err(|err| {
                error!("Failed to fetch oauth profile: {}", err);
                OAuthCallbackError::OAuthFailed
            })
    }
}
