//! # Authgate
//!
//! `authgate` signs end users in to a web application and hands them a session
//! credential for later requests.
//!
//! ## Sign-in paths
//!
//! - **Email and password:** passwords are stored as Argon2id PHC strings and never
//!   leave the service in any form.
//! - **Google OAuth2:** the authorization-code flow, guarded by single-use state
//!   tokens that expire after five minutes. Accounts are created on first sign-in
//!   and matched by provider identity afterwards.
//!
//! ## Sessions
//!
//! Sessions are stateless HMAC-SHA256 tokens carrying the user id and email. They
//! travel in an `HttpOnly`, `SameSite=Strict` cookie (or a bearer header) and are
//! reissued whenever the session is introspected. Logging out clears the cookie;
//! nothing is revoked server side.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with("authgate/"));
        assert!(APP_USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }
}
