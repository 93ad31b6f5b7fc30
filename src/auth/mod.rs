//! Authentication and session issuance.
//!
//! Two ways in: email/password ([`password`]) and Google OAuth2 ([`oauth`]).
//! Both end in a signed, expiring session token ([`token`]) that later requests
//! present back. [`AuthService`] ties the pieces together on top of a
//! [`UserRepository`].
//!
//! OAuth callbacks are protected by single-use anti-forgery state tokens held in
//! [`OAuthStateStore`]; the state is checked before any request reaches the
//! provider.

pub mod error;
pub mod oauth;
pub mod password;
pub mod repository;
pub mod service;
pub mod state;
pub mod token;
pub mod user;


pub use error::{AuthError, OAuthCallbackError};
pub use oauth::{GoogleConfig, GoogleProvider, OAuthFlow, OAuthProvider, ProviderProfile};
pub use repository::{PgUserRepository, RepositoryError, UserRepository};
pub use service::{AuthConfig, AuthService, AuthSession, SESSION_COOKIE_NAME};
pub use state::{spawn_sweeper, OAuthStateStore};
pub use token::{SessionClaims, SessionCodec, SessionKeys};
pub use user::{User, UserDetails};
