use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("email already registered")]
    Conflict,
    #[error("user not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence boundary for users.
///
/// Emails are expected to be normalized by the caller. `create` must make the
/// uniqueness check and the insert one atomic step.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<User, RepoError>;

    /// Stores `token` as the user's outstanding verification token, replacing
    /// any earlier one. Only applies while the stored row is still unverified;
    /// returns `false` when nothing was written.
    async fn issue_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        sent_at: OffsetDateTime,
    ) -> Result<bool, RepoError>;

    /// Clears the outstanding token, but only if it is still `token`. A newer
    /// token issued in the meantime is left alone.
    async fn revoke_verification_token(&self, user_id: Uuid, token: &str)
        -> Result<bool, RepoError>;

    /// Marks the owner of `token` verified and clears the token, provided it
    /// was issued after `issued_after`. Fails with `NotFound` otherwise.
    async fn consume_verification_token(
        &self,
        token: &str,
        issued_after: OffsetDateTime,
    ) -> Result<User, RepoError>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_email_verified, \
     email_verification_token, email_verification_sent_at, created_at";

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => RepoError::Conflict,
                other => RepoError::Database(other),
            })?;
        debug!(user_id = %created.id, "user row inserted");
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn issue_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
        sent_at: OffsetDateTime,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET email_verification_token = $2,
                   email_verification_sent_at = $3
             WHERE id = $1
               AND is_email_verified = FALSE
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(sent_at)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_verification_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET email_verification_token = NULL,
                   email_verification_sent_at = NULL
             WHERE id = $1
               AND email_verification_token = $2
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        issued_after: OffsetDateTime,
    ) -> Result<User, RepoError> {
        // Single conditional update: two concurrent consumers cannot both win.
        let sql = format!(
            r#"
            UPDATE users
               SET is_email_verified = TRUE,
                   email_verification_token = NULL,
                   email_verification_sent_at = NULL
             WHERE email_verification_token = $1
               AND email_verification_sent_at > $2
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .bind(issued_after)
            .fetch_optional(&self.db)
            .await?
            .ok_or(RepoError::NotFound)
    }
}
