//! Stateless session tokens.
//!
//! A token is `base64url(header).base64url(claims).base64url(hmac)` with an
//! HMAC-SHA256 signature over the first two segments. Nothing is stored server
//! side: expiry is the only lifecycle control, refresh is the caller's decision.
//!
//! Secret rotation is supported through [`SessionKeys`]: tokens are signed with the
//! newest secret and accepted when any configured secret verifies them.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use ulid::Ulid;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const ALG: &str = "HS256";
const TYP: &str = "JWT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("session secret must not be empty")]
    EmptySecret,
    #[error("failed to sign token")]
    Signing,
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Identity asserted by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Ordered signing secrets, newest first.
#[derive(Debug, Clone)]
pub struct SessionKeys {
    keys: Vec<SecretString>,
}

impl SessionKeys {
    /// Build a key ring from the current secret and any previous ones still accepted.
    ///
    /// # Errors
    /// Returns [`TokenError::EmptySecret`] if any secret is empty.
    pub fn new(current: SecretString, previous: Vec<SecretString>) -> Result<Self, TokenError> {
        let mut keys = Vec::with_capacity(previous.len() + 1);
        keys.push(current);
        keys.extend(previous);
        if keys.iter().any(|key| key.expose_secret().is_empty()) {
            return Err(TokenError::EmptySecret);
        }
        Ok(Self { keys })
    }

    fn signing_key(&self) -> &SecretString {
        // `new` guarantees at least one key.
        &self.keys[0]
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_key().expose_secret().as_bytes())
            .map_err(|_| TokenError::Signing)?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify(&self, input: &[u8], signature: &[u8]) -> bool {
        self.keys.iter().any(|key| {
            HmacSha256::new_from_slice(key.expose_secret().as_bytes()).is_ok_and(|mut mac| {
                mac.update(input);
                mac.verify_slice(signature).is_ok()
            })
        })
    }
}

/// Issues and validates signed session tokens.
#[derive(Debug, Clone)]
pub struct SessionCodec {
    keys: SessionKeys,
    ttl_seconds: i64,
}

impl SessionCodec {
    #[must_use]
    pub fn new(keys: SessionKeys, ttl: Duration) -> Self {
        Self {
            keys,
            ttl_seconds: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a token for `user_id` expiring one TTL from now.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if the claims cannot be encoded or signed.
    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, email, Utc::now().timestamp())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        email: &str,
        now_unix_seconds: i64,
    ) -> Result<String, TokenError> {
        let header = TokenHeader {
            alg: ALG.to_string(),
            typ: TYP.to_string(),
        };
        let claims = SessionClaims {
            sub: user_id,
            email: email.to_string(),
            iat: now_unix_seconds,
            exp: now_unix_seconds.saturating_add(self.ttl_seconds),
            jti: Ulid::new().to_string(),
        };

        let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(&claims)?);
        let signature = self.keys.sign(signing_input.as_bytes())?;

        Ok(format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        ))
    }

    /// Validate a token and return its claims.
    ///
    /// The signature is checked before any segment is decoded, and expiry is checked
    /// against a fresh clock read.
    ///
    /// # Errors
    /// - [`TokenError::Malformed`] if the token is not three segments or does not decode
    /// - [`TokenError::InvalidSignature`] if no configured secret verifies it
    /// - [`TokenError::Expired`] if `exp` has passed
    pub fn validate(&self, token: &str) -> Result<SessionClaims, TokenError> {
        // Anything but three segments is rejected before any key is tried.
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let signature =
            Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| TokenError::InvalidSignature)?;
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        if !self.keys.verify(signing_input.as_bytes(), &signature) {
            return Err(TokenError::InvalidSignature);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != ALG {
            return Err(TokenError::Malformed);
        }
        let claims: SessionClaims = b64d_json(claims_b64)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|_| TokenError::Signing)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}
