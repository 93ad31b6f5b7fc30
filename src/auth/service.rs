//! Composition root for registration, login, OAuth and session introspection.

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, instrument, warn};
use url::{form_urlencoded, Url};

use super::{
    error::{AuthError, OAuthCallbackError},
    oauth::OAuthFlow,
    password::{hash_password, verify_dummy, verify_password},
    repository::{RepositoryError, UserRepository},
    token::SessionCodec,
    user::{User, UserDetails},
};

pub const SESSION_COOKIE_NAME: &str = "session_token";

const DEFAULT_SESSION_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;
const DEFAULT_OAUTH_STATE_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_OAUTH_SWEEP_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_OAUTH_HTTP_TIMEOUT_SECONDS: u64 = 10;

static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

fn valid_email(email: &str) -> bool {
    EMAIL_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(email))
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: u64,
    min_password_length: usize,
    oauth_state_ttl_seconds: u64,
    oauth_sweep_interval_seconds: u64,
    oauth_http_timeout_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url: frontend_base_url.trim_end_matches('/').to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            oauth_state_ttl_seconds: DEFAULT_OAUTH_STATE_TTL_SECONDS,
            oauth_sweep_interval_seconds: DEFAULT_OAUTH_SWEEP_INTERVAL_SECONDS,
            oauth_http_timeout_seconds: DEFAULT_OAUTH_HTTP_TIMEOUT_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_min_password_length(mut self, length: usize) -> Self {
        self.min_password_length = length;
        self
    }

    #[must_use]
    pub fn with_oauth_state_ttl_seconds(mut self, seconds: u64) -> Self {
        self.oauth_state_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_oauth_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.oauth_sweep_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_oauth_http_timeout_seconds(mut self, seconds: u64) -> Self {
        self.oauth_http_timeout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }

    #[must_use]
    pub fn oauth_state_ttl(&self) -> Duration {
        Duration::from_secs(self.oauth_state_ttl_seconds)
    }

    #[must_use]
    pub fn oauth_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.oauth_sweep_interval_seconds)
    }

    #[must_use]
    pub fn oauth_http_timeout(&self) -> Duration {
        Duration::from_secs(self.oauth_http_timeout_seconds)
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// A signed-in user and the token proving it.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserDetails,
    pub token: String,
}

pub struct AuthService {
    config: AuthConfig,
    users: Arc<dyn UserRepository>,
    codec: SessionCodec,
    oauth: Option<OAuthFlow>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("config", &self.config)
            .field("oauth", &self.oauth)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserRepository>,
        codec: SessionCodec,
        oauth: Option<OAuthFlow>,
    ) -> Self {
        Self {
            config,
            users,
            codec,
            oauth,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn oauth(&self) -> Option<&OAuthFlow> {
        self.oauth.as_ref()
    }

    /// Create a password account and sign it in.
    ///
    /// # Errors
    /// [`AuthError::Validation`] for missing or malformed input,
    /// [`AuthError::AlreadyRegistered`] when the email is taken.
    #[instrument(skip_all)]
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "email and password are required".to_string(),
            ));
        }

        if !valid_email(email) {
            return Err(AuthError::Validation("invalid email address".to_string()));
        }

        // Counted in UTF-8 bytes.
        if password.len() < self.config.min_password_length {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                self.config.min_password_length
            )));
        }

        if self
            .users
            .find_by_email(email)
            .await
            .map_err(repository_error)?
            .is_some()
        {
            return Err(AuthError::AlreadyRegistered);
        }

        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("password hashing task failed")?
            .context("failed to hash password")?;

        // The store's unique constraint settles concurrent registrations.
        let user = match self.users.create_local(email, &hash).await {
            Ok(user) => user,
            Err(RepositoryError::UniqueViolation) => return Err(AuthError::AlreadyRegistered),
            Err(RepositoryError::Other(err)) => {
                return Err(AuthError::Internal(err.context("failed to create user")))
            }
        };

        info!(user_id = %user.id, "User registered");

        self.start_session(&user)
    }

    /// Check an email/password pair and sign the account in.
    ///
    /// Unknown emails, OAuth-only accounts and wrong passwords are all
    /// [`AuthError::InvalidCredentials`].
    ///
    /// # Errors
    /// See above; [`AuthError::Validation`] when a field is missing.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "email and password are required".to_string(),
            ));
        }

        let user = self
            .users
            .find_by_email(email)
            .await
            .map_err(repository_error)?;

        let hash = user.as_ref().and_then(|user| user.password_hash.clone());
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || match hash {
            Some(hash) => verify_password(&hash, &password),
            None => {
                verify_dummy(&password);
                Ok(false)
            }
        })
        .await
        .context("password verification task failed")?;

        let verified = verified.unwrap_or_else(|err| {
            error!("Stored password hash is unusable: {}", err);
            false
        });

        let Some(user) = user.filter(|_| verified) else {
            debug!("Login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        info!(user_id = %user.id, "User logged in");

        self.start_session(&user)
    }

    /// Start an OAuth flow; returns the provider URL to redirect to.
    ///
    /// # Errors
    /// [`AuthError::OAuthDisabled`] when no provider is configured.
    pub async fn oauth_initiate(&self) -> Result<Url, AuthError> {
        let flow = self.oauth.as_ref().ok_or(AuthError::OAuthDisabled)?;
        flow.initiate()
            .await
            .context("failed to start oauth flow")
            .map_err(AuthError::Internal)
    }

    /// Finish an OAuth flow: validate, resolve or create the linked account and
    /// sign it in.
    ///
    /// # Errors
    /// See [`OAuthCallbackError`]. Account lookup or creation failures are
    /// [`OAuthCallbackError::Internal`].
    #[instrument(skip_all)]
    pub async fn oauth_callback(
        &self,
        state: Option<&str>,
        code: Option<&str>,
    ) -> Result<AuthSession, OAuthCallbackError> {
        let Some(flow) = self.oauth.as_ref() else {
            warn!("OAuth callback received but oauth is not configured");
            return Err(OAuthCallbackError::OAuthFailed);
        };

        let profile = flow.authenticate(state, code).await?;
        let provider = flow.provider_name();

        let existing = self
            .users
            .find_by_provider_identity(provider, &profile.id)
            .await
            .map_err(|err| OAuthCallbackError::Internal(repository_anyhow(err)))?;

        let user = if let Some(user) = existing {
            user
        } else {
            match self
                .users
                .create_oauth(&profile.email, provider, &profile.id)
                .await
            {
                Ok(user) => {
                    info!(user_id = %user.id, provider, "User created from oauth profile");
                    user
                }
                Err(RepositoryError::UniqueViolation) => {
                    // Email belongs to an account with another sign-in method.
                    return Err(OAuthCallbackError::Internal(anyhow::anyhow!(
                        "email already registered without this {provider} identity"
                    )));
                }
                Err(RepositoryError::Other(err)) => {
                    return Err(OAuthCallbackError::Internal(
                        err.context("failed to create oauth user"),
                    ))
                }
            }
        };

        let token = self.codec.issue(user.id, &user.email).map_err(|err| {
            error!("Failed to sign session token: {}", err);
            OAuthCallbackError::OAuthFailed
        })?;

        Ok(AuthSession {
            user: UserDetails::from(&user),
            token,
        })
    }

    /// Resolve a session token to the current user and mint a fresh token.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] for any invalid token,
    /// [`AuthError::UserNotFound`] when the account no longer exists.
    #[instrument(skip_all)]
    pub async fn introspect(&self, token: &str) -> Result<AuthSession, AuthError> {
        let claims = self.codec.validate(token).map_err(|err| {
            debug!("Rejected session token: {}", err);
            AuthError::Unauthorized
        })?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await
            .map_err(repository_error)?
            .ok_or(AuthError::UserNotFound)?;

        self.start_session(&user)
    }

    /// Sessions are stateless; logging out only clears the client cookie.
    #[must_use]
    pub fn logout(&self) -> String {
        self.cleared_session_cookie()
    }

    /// `Set-Cookie` value carrying `token`.
    #[must_use]
    pub fn session_cookie(&self, token: &str) -> String {
        let ttl_seconds = self.codec.ttl_seconds();
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={ttl_seconds}"
        );
        if self.config.session_cookie_secure() {
            cookie.push_str("; Secure");
        }
        cookie
    }

    #[must_use]
    pub fn cleared_session_cookie(&self) -> String {
        let mut cookie =
            format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=-1");
        if self.config.session_cookie_secure() {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Frontend location reached after a successful OAuth sign-in.
    #[must_use]
    pub fn oauth_success_redirect(&self, user: &UserDetails) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("id", &user.id.to_string())
            .append_pair("email", &user.email);
        if let Some(provider) = user.oauth_provider.as_deref() {
            query.append_pair("oauth_provider", provider);
        }
        format!(
            "{}/auth/callback?{}",
            self.config.frontend_base_url,
            query.finish()
        )
    }

    /// Frontend login page carrying a short error code.
    #[must_use]
    pub fn oauth_error_redirect(&self, code: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("error", code)
            .finish();
        format!("{}/login?{}", self.config.frontend_base_url, query)
    }

    fn start_session(&self, user: &User) -> Result<AuthSession, AuthError> {
        let token = self
            .codec
            .issue(user.id, &user.email)
            .context("failed to sign session token")?;
        Ok(AuthSession {
            user: UserDetails::from(user),
            token,
        })
    }
}

fn repository_anyhow(err: RepositoryError) -> anyhow::Error {
    match err {
        RepositoryError::Other(err) => err,
        RepositoryError::UniqueViolation => anyhow::anyhow!("unexpected unique violation"),
    }
}

fn repository_error(err: RepositoryError) -> AuthError {
    AuthError::Internal(repository_anyhow(err))
}
