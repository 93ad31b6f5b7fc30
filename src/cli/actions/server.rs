use crate::{
    api::{self, ServerConfig},
    auth::{AuthConfig, GoogleConfig, SessionKeys},
    cli::{commands::oauth::GoogleOptions, telemetry},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub session_secret: SecretString,
    pub session_previous_secrets: Vec<SecretString>,
    pub session_ttl_seconds: u64,
    pub min_password_length: usize,
    pub google: Option<GoogleOptions>,
    pub oauth_state_ttl_seconds: u64,
    pub oauth_sweep_interval_seconds: u64,
    pub oauth_http_timeout_seconds: u64,
}

impl Args {
    /// Turn parsed arguments into the server configuration.
    ///
    /// # Errors
    /// Returns an error if the session secrets or the Google client are unusable.
    pub fn server_config(self) -> Result<ServerConfig> {
        let session_keys = SessionKeys::new(self.session_secret, self.session_previous_secrets)
            .context("Invalid session secret")?;

        let google = self
            .google
            .map(|google| {
                GoogleConfig::new(google.client_id, google.client_secret, google.redirect_url)
            })
            .transpose()
            .context("Invalid Google OAuth configuration")?;

        let auth = AuthConfig::new(self.frontend_base_url)
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_min_password_length(self.min_password_length)
            .with_oauth_state_ttl_seconds(self.oauth_state_ttl_seconds)
            .with_oauth_sweep_interval_seconds(self.oauth_sweep_interval_seconds)
            .with_oauth_http_timeout_seconds(self.oauth_http_timeout_seconds);

        Ok(ServerConfig {
            dsn: self.dsn,
            auth,
            session_keys,
            google,
        })
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let port = args.port;
    let config = args.server_config()?;

    debug!(
        frontend = config.auth.frontend_base_url(),
        google = config.google.is_some(),
        "starting server"
    );

    let result = api::new(port, config).await;

    telemetry::shutdown_tracer();

    result
}
