//! PostgreSQL user repository.

use anyhow::Context;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

use super::{RepositoryError, RepositoryFuture, UserRepository};
use crate::auth::user::User;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = "id, email, password_hash, oauth_provider, oauth_id, created_at";

#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `users` table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the schema statements fail.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "CREATE"
            ))
            .await
            .context("failed to apply users schema")?;
        Ok(())
    }

    async fn fetch_optional_user<'q>(
        &self,
        query: &'q str,
        binds: &[&'q str],
        span: Span,
    ) -> Result<Option<User>, RepositoryError> {
        let mut statement = sqlx::query(query);
        for value in binds {
            statement = statement.bind(*value);
        }
        let row = statement
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user")?;
        row.as_ref().map(user_from_row).transpose()
    }
}

fn user_from_row(row: &PgRow) -> Result<User, RepositoryError> {
    decode_user(row).map_err(decode_error)
}

fn decode_user(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        oauth_provider: row.try_get("oauth_provider")?,
        oauth_id: row.try_get("oauth_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn decode_error(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Other(anyhow::Error::new(err).context("failed to decode user row"))
}

fn query_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn insert_error(err: sqlx::Error) -> RepositoryError {
    if is_unique_violation(&err) {
        RepositoryError::UniqueViolation
    } else {
        RepositoryError::Other(anyhow::Error::new(err).context("failed to insert user"))
    }
}

impl UserRepository for PgUserRepository {
    fn find_by_email<'a>(&'a self, email: &'a str) -> RepositoryFuture<'a, Option<User>> {
        Box::pin(async move {
            let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
            let span = query_span("SELECT", &query);
            self.fetch_optional_user(&query, &[email], span).await
        })
    }

    fn find_by_provider_identity<'a>(
        &'a self,
        provider: &'a str,
        subject: &'a str,
    ) -> RepositoryFuture<'a, Option<User>> {
        Box::pin(async move {
            let query = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE oauth_provider = $1 AND oauth_id = $2"
            );
            let span = query_span("SELECT", &query);
            self.fetch_optional_user(&query, &[provider, subject], span)
                .await
        })
    }

    fn find_by_id(&self, id: Uuid) -> RepositoryFuture<'_, Option<User>> {
        Box::pin(async move {
            let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
            let span = query_span("SELECT", &query);
            let row = sqlx::query(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to lookup user by id")?;
            row.as_ref().map(user_from_row).transpose()
        })
    }

    fn create_local<'a>(
        &'a self,
        email: &'a str,
        password_hash: &'a str,
    ) -> RepositoryFuture<'a, User> {
        Box::pin(async move {
            let query = format!(
                "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
            );
            let span = query_span("INSERT", &query);
            let row = sqlx::query(&query)
                .bind(email)
                .bind(password_hash)
                .fetch_one(&self.pool)
                .instrument(span)
                .await
                .map_err(insert_error)?;
            user_from_row(&row)
        })
    }

    fn create_oauth<'a>(
        &'a self,
        email: &'a str,
        provider: &'a str,
        subject: &'a str,
    ) -> RepositoryFuture<'a, User> {
        Box::pin(async move {
            let query = format!(
                "INSERT INTO users (email, oauth_provider, oauth_id) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
            );
            let span = query_span("INSERT", &query);
            let row = sqlx::query(&query)
                .bind(email)
                .bind(provider)
                .bind(subject)
                .fetch_one(&self.pool)
                .instrument(span)
                .await
                .map_err(insert_error)?;
            user_from_row(&row)
        })
    }
}
