//! PostgreSQL Repository Implementations
//!
//! The one-shot transitions are single conditional `UPDATE`s; the row count
//! (or `RETURNING`) says whether this caller won.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entity::{linked_account::LinkedAccount, user::User};
use crate::domain::repository::{OAuthAccountRepository, UserRepository};
use crate::domain::value_object::{
    email::Email, user_password::UserPassword, user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

const USER_COLUMNS: &str = r#"
    user_id,
    email,
    name,
    image,
    password_hash,
    email_verified,
    verification_token,
    reset_token_digest,
    reset_token_expiry,
    user_role,
    welcome_sent_at,
    created_at,
    updated_at
"#;

/// PostgreSQL-backed identity repository
#[derive(Clone)]
pub struct PgIdentityRepository {
    pool: PgPool,
}

impl PgIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_user(tx: &mut Transaction<'_, Postgres>, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                email,
                name,
                image,
                password_hash,
                email_verified,
                verification_token,
                reset_token_digest,
                reset_token_expiry,
                user_role,
                welcome_sent_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.name.as_deref())
        .bind(user.image.as_deref())
        .bind(user.password_hash.as_ref().map(|p| p.as_phc_string()))
        .bind(user.email_verified)
        .bind(user.verification_token.as_deref())
        .bind(user.reset_token_digest.as_deref())
        .bind(user.reset_token_expiry)
        .bind(user.user_role.code())
        .bind(user.welcome_sent_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(map_unique_email)?;

        Ok(())
    }

    async fn insert_account(
        tx: &mut Transaction<'_, Postgres>,
        account: &LinkedAccount,
    ) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO linked_accounts (
                account_id,
                user_id,
                provider,
                provider_account_id,
                created_at
            ) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider, provider_account_id) DO NOTHING
            "#,
        )
        .bind(account.account_id.as_uuid())
        .bind(account.user_id.as_uuid())
        .bind(&account.provider)
        .bind(&account.provider_account_id)
        .bind(account.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

fn map_unique_email(e: sqlx::Error) -> AuthError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::EmailTaken,
        _ => AuthError::Database(e),
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgIdentityRepository {
    async fn create(&self, user: &User) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_user(&mut tx, user).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn mark_email_verified(&self, user_id: &UserId, now: DateTime<Utc>) -> AuthResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = COALESCE(email_verified, $2),
                verification_token = NULL,
                updated_at = $2
            WHERE user_id = $1
              AND (email_verified IS NULL OR verification_token IS NOT NULL)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn consume_verification(
        &self,
        email: &Email,
        code: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET email_verified = $3, verification_token = NULL, updated_at = $3
            WHERE email = $1 AND verification_token = $2 AND email_verified IS NULL
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.as_str())
            .bind(code)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn replace_verification_token(
        &self,
        user_id: &UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET verification_token = $2, updated_at = $3
            WHERE user_id = $1 AND email_verified IS NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(code)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn store_reset_token(
        &self,
        user_id: &UserId,
        digest: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_digest = $2, reset_token_expiry = $3, updated_at = $4
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(digest)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        new_password: &UserPassword,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<UserId>> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_token_digest = NULL,
                reset_token_expiry = NULL,
                updated_at = $3
            WHERE reset_token_digest = $1 AND reset_token_expiry > $3
            RETURNING user_id
            "#,
        )
        .bind(digest)
        .bind(new_password.as_phc_string())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id.map(UserId::from_uuid))
    }

    async fn claim_welcome(&self, user_id: &UserId, now: DateTime<Utc>) -> AuthResult<bool> {
        let updated = sqlx::query(
            "UPDATE users SET welcome_sent_at = $2 WHERE user_id = $1 AND welcome_sent_at IS NULL",
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }
}

// ============================================================================
// Linked Account Repository Implementation
// ============================================================================

impl OAuthAccountRepository for PgIdentityRepository {
    async fn find_by_provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AuthResult<Option<User>> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE user_id = (
                SELECT user_id FROM linked_accounts
                WHERE provider = $1 AND provider_account_id = $2
            )
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(provider)
            .bind(provider_account_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn link_account(&self, account: &LinkedAccount) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_account(&mut tx, account).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_with_account(&self, user: &User, account: &LinkedAccount) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_user(&mut tx, user).await?;
        Self::insert_account(&mut tx, account).await?;
        tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    name: Option<String>,
    image: Option<String>,
    password_hash: Option<String>,
    email_verified: Option<DateTime<Utc>>,
    verification_token: Option<String>,
    reset_token_digest: Option<String>,
    reset_token_expiry: Option<DateTime<Utc>>,
    user_role: String,
    welcome_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let password_hash = self
            .password_hash
            .map(UserPassword::from_phc_string)
            .transpose()?;

        let user_role = UserRole::from_code(&self.user_role).ok_or_else(|| {
            AuthError::Internal(format!("Invalid user_role: {}", self.user_role))
        })?;

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            email: Email::from_db(self.email),
            name: self.name,
            image: self.image,
            password_hash,
            email_verified: self.email_verified,
            verification_token: self.verification_token,
            reset_token_digest: self.reset_token_digest,
            reset_token_expiry: self.reset_token_expiry,
            user_role,
            welcome_sent_at: self.welcome_sent_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
