//! User records and their outward projection.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A user as stored by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub oauth_provider: Option<String>,
    pub oauth_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// User fields safe to return to clients.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserDetails {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_provider: Option<String>,
    pub created_at: String,
}

impl From<&User> for UserDetails {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            oauth_provider: user.oauth_provider.clone(),
            created_at: user.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use chrono::TimeZone;

    fn user(oauth_provider: Option<&str>) -> Result<User> {
        Ok(User {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            password_hash: Some("$argon2id$secret".to_string()),
            oauth_provider: oauth_provider.map(str::to_string),
            oauth_id: oauth_provider.map(|_| "1234".to_string()),
            created_at: Utc
                .with_ymd_and_hms(2024, 5, 1, 12, 30, 45)
                .single()
                .context("valid timestamp")?,
        })
    }

    #[test]
    fn details_never_carry_password_hash() -> Result<()> {
        let details = UserDetails::from(&user(None)?);
        let value = serde_json::to_value(&details)?;
        assert_eq!(
            value.get("created_at").and_then(|v| v.as_str()),
            Some("2024-05-01T12:30:45Z")
        );
        assert!(value.get("password_hash").is_none());
        assert!(value.get("oauth_provider").is_none());
        assert!(!value.to_string().contains("argon2"));
        Ok(())
    }

    #[test]
    fn details_include_oauth_provider() -> Result<()> {
        let details = UserDetails::from(&user(Some("google"))?);
        assert_eq!(details.oauth_provider.as_deref(), Some("google"));
        Ok(())
    }
}
