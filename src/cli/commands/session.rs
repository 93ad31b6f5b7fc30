use anyhow::{bail, Context};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_PREVIOUS_SECRETS: &str = "session-previous-secrets";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_MIN_PASSWORD_LENGTH: &str = "min-password-length";

#[derive(Debug, Clone)]
pub struct Options {
    pub frontend_base_url: String,
    pub secret: SecretString,
    pub previous_secrets: Vec<SecretString>,
    pub ttl_seconds: u64,
    pub min_password_length: usize,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the secret is missing or the frontend URL is not absolute.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let secret = match matches.get_one::<String>(ARG_SESSION_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => bail!("missing required argument: --{ARG_SESSION_SECRET}"),
        };

        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .context("missing required argument: --frontend-base-url")?;
        Url::parse(&frontend_base_url)
            .with_context(|| format!("invalid --{ARG_FRONTEND_BASE_URL}: {frontend_base_url}"))?;

        // Comma separated, empty entries ignored so an empty env var means "none".
        let previous_secrets = matches
            .get_one::<String>(ARG_SESSION_PREVIOUS_SECRETS)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|secret| !secret.is_empty())
                    .map(|secret| SecretString::from(secret.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            frontend_base_url,
            secret,
            previous_secrets,
            ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(604_800),
            min_password_length: matches
                .get_one::<usize>(ARG_MIN_PASSWORD_LENGTH)
                .copied()
                .unwrap_or(8),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for OAuth redirects")
                .long_help(
                    "Frontend base URL used for OAuth redirects.\n\nWhen it uses https the session cookie is marked Secure.",
                )
                .env("AUTHGATE_FRONTEND_BASE_URL")
                .default_value("http://localhost:7701"),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session tokens")
                .env("AUTHGATE_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_PREVIOUS_SECRETS)
                .long(ARG_SESSION_PREVIOUS_SECRETS)
                .help("Comma separated secrets still accepted for verification")
                .env("AUTHGATE_SESSION_PREVIOUS_SECRETS")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session token TTL in seconds")
                .env("AUTHGATE_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_MIN_PASSWORD_LENGTH)
                .long(ARG_MIN_PASSWORD_LENGTH)
                .help("Minimum password length for registration")
                .env("AUTHGATE_MIN_PASSWORD_LENGTH")
                .default_value("8")
                .value_parser(clap::builder::RangedU64ValueParser::<usize>::new().range(1..)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("authgate"))
    }

    #[test]
    fn parse_defaults() -> anyhow::Result<()> {
        temp_env::with_vars_unset(
            [
                "AUTHGATE_FRONTEND_BASE_URL",
                "AUTHGATE_SESSION_PREVIOUS_SECRETS",
                "AUTHGATE_SESSION_TTL_SECONDS",
                "AUTHGATE_MIN_PASSWORD_LENGTH",
            ],
            || {
                let matches =
                    command().get_matches_from(["authgate", "--session-secret", "s3cret"]);
                let options = Options::parse(&matches)?;
                assert_eq!(options.frontend_base_url, "http://localhost:7701");
                assert_eq!(options.secret.expose_secret(), "s3cret");
                assert!(options.previous_secrets.is_empty());
                assert_eq!(options.ttl_seconds, 604_800);
                assert_eq!(options.min_password_length, 8);
                Ok(())
            },
        )
    }

    #[test]
    fn previous_secrets_are_split() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("AUTHGATE_SESSION_SECRET", Some("current")),
                ("AUTHGATE_SESSION_PREVIOUS_SECRETS", Some("old-1, ,old-2,")),
            ],
            || {
                let matches = command().get_matches_from(["authgate"]);
                let options = Options::parse(&matches)?;
                let previous: Vec<&str> = options
                    .previous_secrets
                    .iter()
                    .map(|secret| secret.expose_secret())
                    .collect();
                assert_eq!(previous, ["old-1", "old-2"]);
                Ok(())
            },
        )
    }

    #[test]
    fn blank_secret_is_rejected() {
        temp_env::with_vars([("AUTHGATE_SESSION_SECRET", Some("  "))], || {
            let matches = command().get_matches_from(["authgate"]);
            let result = Options::parse(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err
                    .to_string()
                    .contains("missing required argument: --session-secret"));
            }
        });
    }

    #[test]
    fn relative_frontend_url_is_rejected() {
        let matches = command().get_matches_from([
            "authgate",
            "--session-secret",
            "s3cret",
            "--frontend-base-url",
            "/app",
        ]);
        assert!(Options::parse(&matches).is_err());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let result = command().try_get_matches_from([
            "authgate",
            "--session-secret",
            "s3cret",
            "--session-ttl-seconds",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_min_password_length_is_rejected() {
        let result = command().try_get_matches_from([
            "authgate",
            "--session-secret",
            "s3cret",
            "--min-password-length",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn min_password_length_from_flag() {
        temp_env::with_var_unset("AUTHGATE_MIN_PASSWORD_LENGTH", || {
            let matches = command().get_matches_from([
                "authgate",
                "--session-secret",
                "s3cret",
                "--min-password-length",
                "12",
            ]);
            assert_eq!(
                matches.get_one::<usize>(ARG_MIN_PASSWORD_LENGTH).copied(),
                Some(12)
            );
        });
    }
}
