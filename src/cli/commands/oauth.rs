use anyhow::{bail, Context};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_GOOGLE_REDIRECT_URL: &str = "google-redirect-url";
pub const ARG_OAUTH_STATE_TTL_SECONDS: &str = "oauth-state-ttl-seconds";
pub const ARG_OAUTH_SWEEP_INTERVAL_SECONDS: &str = "oauth-sweep-interval-seconds";
pub const ARG_OAUTH_HTTP_TIMEOUT_SECONDS: &str = "oauth-http-timeout-seconds";

/// Google client registration.
#[derive(Debug, Clone)]
pub struct GoogleOptions {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_url: Url,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub google: Option<GoogleOptions>,
    pub state_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub http_timeout_seconds: u64,
}

impl Options {
    /// Parse OAuth arguments from matches.
    ///
    /// Google sign-in stays disabled unless all three client arguments are set.
    ///
    /// # Errors
    /// Returns an error if only part of the Google client is configured or the redirect URL is invalid.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // Helper to filter empty strings which clap might pass through if env vars are set to ""
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let google = match (
            get_non_empty(ARG_GOOGLE_CLIENT_ID),
            get_non_empty(ARG_GOOGLE_CLIENT_SECRET),
            get_non_empty(ARG_GOOGLE_REDIRECT_URL),
        ) {
            (None, None, None) => None,
            (Some(client_id), Some(client_secret), Some(redirect_url)) => Some(GoogleOptions {
                client_id,
                client_secret: SecretString::from(client_secret),
                redirect_url: Url::parse(&redirect_url).with_context(|| {
                    format!("invalid --{ARG_GOOGLE_REDIRECT_URL}: {redirect_url}")
                })?,
            }),
            _ => bail!(
                "Google OAuth needs --{ARG_GOOGLE_CLIENT_ID}, --{ARG_GOOGLE_CLIENT_SECRET} and --{ARG_GOOGLE_REDIRECT_URL} together"
            ),
        };

        let get_seconds =
            |id: &str, default: u64| matches.get_one::<u64>(id).copied().unwrap_or(default);

        Ok(Self {
            google,
            state_ttl_seconds: get_seconds(ARG_OAUTH_STATE_TTL_SECONDS, 300),
            sweep_interval_seconds: get_seconds(ARG_OAUTH_SWEEP_INTERVAL_SECONDS, 60),
            http_timeout_seconds: get_seconds(ARG_OAUTH_HTTP_TIMEOUT_SECONDS, 10),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth client id")
                .env("AUTHGATE_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("Google OAuth client secret")
                .env("AUTHGATE_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_GOOGLE_REDIRECT_URL)
                .long(ARG_GOOGLE_REDIRECT_URL)
                .help("Callback URL registered with Google")
                .long_help(
                    "Callback URL registered with Google, e.g. https://auth.example.com/auth/oauth/callback",
                )
                .env("AUTHGATE_GOOGLE_REDIRECT_URL"),
        )
        .arg(
            Arg::new(ARG_OAUTH_STATE_TTL_SECONDS)
                .long(ARG_OAUTH_STATE_TTL_SECONDS)
                .help("Lifetime of an OAuth state token in seconds")
                .env("AUTHGATE_OAUTH_STATE_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_OAUTH_SWEEP_INTERVAL_SECONDS)
                .long(ARG_OAUTH_SWEEP_INTERVAL_SECONDS)
                .help("How often expired OAuth states are purged, in seconds")
                .env("AUTHGATE_OAUTH_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_OAUTH_HTTP_TIMEOUT_SECONDS)
                .long(ARG_OAUTH_HTTP_TIMEOUT_SECONDS)
                .help("Timeout for calls to the OAuth provider in seconds")
                .env("AUTHGATE_OAUTH_HTTP_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const GOOGLE_VARS: [&str; 3] = [
        "AUTHGATE_GOOGLE_CLIENT_ID",
        "AUTHGATE_GOOGLE_CLIENT_SECRET",
        "AUTHGATE_GOOGLE_REDIRECT_URL",
    ];

    fn command() -> Command {
        with_args(Command::new("authgate"))
    }

    #[test]
    fn google_disabled_by_default() -> anyhow::Result<()> {
        temp_env::with_vars_unset(GOOGLE_VARS, || {
            let matches = command().get_matches_from(["authgate"]);
            let options = Options::parse(&matches)?;
            assert!(options.google.is_none());
            assert_eq!(options.state_ttl_seconds, 300);
            assert_eq!(options.sweep_interval_seconds, 60);
            assert_eq!(options.http_timeout_seconds, 10);
            Ok(())
        })
    }

    #[test]
    fn google_from_env() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("AUTHGATE_GOOGLE_CLIENT_ID", Some("client-id")),
                ("AUTHGATE_GOOGLE_CLIENT_SECRET", Some("client-secret")),
                (
                    "AUTHGATE_GOOGLE_REDIRECT_URL",
                    Some("http://localhost:7701/auth/oauth/callback"),
                ),
            ],
            || {
                let matches = command().get_matches_from(["authgate"]);
                let google = Options::parse(&matches)?
                    .google
                    .context("google options missing")?;
                assert_eq!(google.client_id, "client-id");
                assert_eq!(google.client_secret.expose_secret(), "client-secret");
                assert_eq!(google.redirect_url.path(), "/auth/oauth/callback");
                Ok(())
            },
        )
    }

    #[test]
    fn partial_google_config_is_rejected() {
        temp_env::with_vars(
            [
                ("AUTHGATE_GOOGLE_CLIENT_ID", Some("client-id")),
                ("AUTHGATE_GOOGLE_CLIENT_SECRET", Some("")),
                ("AUTHGATE_GOOGLE_REDIRECT_URL", None),
            ],
            || {
                let matches = command().get_matches_from(["authgate"]);
                assert!(Options::parse(&matches).is_err());
            },
        );
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let result =
            command().try_get_matches_from(["authgate", "--oauth-sweep-interval-seconds", "0"]);
        assert!(result.is_err());
    }
}
