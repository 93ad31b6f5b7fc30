//! Map validated command-line arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{oauth, session, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(7701);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let session_opts = session::Options::parse(matches)?;
    let oauth_opts = oauth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url: session_opts.frontend_base_url,
        session_secret: session_opts.secret,
        session_previous_secrets: session_opts.previous_secrets,
        session_ttl_seconds: session_opts.ttl_seconds,
        min_password_length: session_opts.min_password_length,
        google: oauth_opts.google,
        oauth_state_ttl_seconds: oauth_opts.state_ttl_seconds,
        oauth_sweep_interval_seconds: oauth_opts.sweep_interval_seconds,
        oauth_http_timeout_seconds: oauth_opts.http_timeout_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DSN: &str = "postgres://user@localhost:5432/authgate";

    #[test]
    fn server_action_from_env() -> Result<()> {
        temp_env::with_vars(
            [
                ("AUTHGATE_DSN", Some(DSN)),
                ("AUTHGATE_PORT", Some("9000")),
                ("AUTHGATE_SESSION_SECRET", Some("s3cret")),
                ("AUTHGATE_SESSION_TTL_SECONDS", Some("60")),
                ("AUTHGATE_GOOGLE_CLIENT_ID", None),
                ("AUTHGATE_GOOGLE_CLIENT_SECRET", None),
                ("AUTHGATE_GOOGLE_REDIRECT_URL", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["authgate"]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 9000);
                assert_eq!(args.dsn, DSN);
                assert_eq!(args.session_ttl_seconds, 60);
                assert!(args.google.is_none());
                Ok(())
            },
        )
    }

    #[test]
    fn partial_google_config_fails() {
        temp_env::with_vars(
            [
                ("AUTHGATE_DSN", Some(DSN)),
                ("AUTHGATE_SESSION_SECRET", Some("s3cret")),
                ("AUTHGATE_GOOGLE_CLIENT_ID", Some("client-id")),
                ("AUTHGATE_GOOGLE_CLIENT_SECRET", None),
                ("AUTHGATE_GOOGLE_REDIRECT_URL", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["authgate"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("--google-client-secret"));
                }
            },
        );
    }
}
