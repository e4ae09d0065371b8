use crate::config::database::{Database, DatabaseTrait};
use crate::config::logging::secure_log;
use crate::entity::refresh_token::{RefreshToken, RefreshTokenWithUser};
use crate::entity::user::{Role, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Error;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait RefreshTokenRepositoryTrait: Send + Sync {
    async fn create(&self, user_id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<RefreshToken, Error>;
    async fn find_for_user(&self, token_hash: &str, user_id: Uuid) -> Result<Option<RefreshToken>, Error>;
    async fn find_with_user(&self, token_hash: &str) -> Result<Option<RefreshTokenWithUser>, Error>;
    async fn delete(&self, id: Uuid) -> Result<bool, Error>;
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, Error>;
    async fn delete_by_hash(&self, token_hash: &str) -> Result<u64, Error>;
    async fn rotate(&self, id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<(), Error>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}

#[derive(Clone)]
pub struct RefreshTokenRepository {
    db_conn: Arc<Database>,
}

impl RefreshTokenRepository {
    pub fn new(db_conn: &Arc<Database>) -> Self {
        Self {
            db_conn: Arc::clone(db_conn),
        }
    }
}

/// Row shape of the token/owner join
#[derive(sqlx::FromRow)]
struct TokenOwnerRow {
    token_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    token_created_at: DateTime<Utc>,
    id: Uuid,
    name: String,
    email: String,
    phone_number: String,
    password: String,
    role: Role,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TokenOwnerRow> for RefreshTokenWithUser {
    fn from(row: TokenOwnerRow) -> Self {
        Self {
            token: RefreshToken {
                id: row.token_id,
                token_hash: row.token_hash,
                user_id: row.id,
                expires_at: row.expires_at,
                created_at: row.token_created_at,
            },
            user: User {
                id: row.id,
                name: row.name,
                email: row.email,
                phone_number: row.phone_number,
                password: row.password,
                role: row.role,
                is_verified: row.is_verified,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

#[async_trait]
impl RefreshTokenRepositoryTrait for RefreshTokenRepository {
    async fn create(&self, user_id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<RefreshToken, Error> {
        let start = std::time::Instant::now();

        let result = sqlx::query_as::<_, RefreshToken>(
            "INSERT INTO refresh_tokens (id, token_hash, user_id, expires_at) VALUES ($1, $2, $3, $4) \
             RETURNING id, token_hash, user_id, expires_at, created_at"
        )
        .bind(Uuid::now_v7())
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(self.db_conn.get_pool())
        .await;

        match &result {
            Ok(_) => secure_log::sensitive_debug!("Refresh token stored for user in {:?}", start.elapsed()),
            Err(e) => secure_log::secure_error!("Failed to store refresh token for user", e),
        }
        result
    }

    async fn find_for_user(&self, token_hash: &str, user_id: Uuid) -> Result<Option<RefreshToken>, Error> {
        let result = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, token_hash, user_id, expires_at, created_at FROM refresh_tokens \
             WHERE token_hash = $1 AND user_id = $2"
        )
        .bind(token_hash)
        .bind(user_id)
        .fetch_optional(self.db_conn.get_pool())
        .await;

        if let Err(e) = &result {
            secure_log::secure_error!("Refresh token lookup failed", e);
        }
        result
    }

    async fn find_with_user(&self, token_hash: &str) -> Result<Option<RefreshTokenWithUser>, Error> {
        let start = std::time::Instant::now();

        let result = sqlx::query_as::<_, TokenOwnerRow>(
            "SELECT rt.id AS token_id, rt.token_hash, rt.expires_at, rt.created_at AS token_created_at, \
                    u.id, u.name, u.email, u.phone_number, u.password, u.role, u.is_verified, u.created_at, u.updated_at \
             FROM refresh_tokens rt JOIN users u ON u.id = rt.user_id \
             WHERE rt.token_hash = $1"
        )
        .bind(token_hash)
        .fetch_optional(self.db_conn.get_pool())
        .await;

        match result {
            Ok(row) => {
                secure_log::sensitive_debug!("Refresh token owner lookup completed in {:?}", start.elapsed());
                Ok(row.map(RefreshTokenWithUser::from))
            }
            Err(e) => {
                secure_log::secure_error!("Refresh token owner lookup failed", e);
                Err(e)
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(self.db_conn.get_pool())
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(e) => {
                secure_log::secure_error!("Failed to delete refresh token", e);
                Err(e)
            }
        }
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db_conn.get_pool())
            .await;

        match result {
            Ok(done) => {
                tracing::info!("SECURITY: Revoked {} refresh tokens for user ID: {}", done.rows_affected(), user_id);
                Ok(done.rows_affected())
            }
            Err(e) => {
                secure_log::secure_error!("Failed to revoke refresh tokens for user", e);
                Err(e)
            }
        }
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.db_conn.get_pool())
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected()),
            Err(e) => {
                secure_log::secure_error!("Failed to delete refresh token by hash", e);
                Err(e)
            }
        }
    }

    async fn rotate(&self, id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<(), Error> {
        let result = sqlx::query("UPDATE refresh_tokens SET token_hash = $1, expires_at = $2 WHERE id = $3")
            .bind(token_hash)
            .bind(expires_at)
            .bind(id)
            .execute(self.db_conn.get_pool())
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(Error::RowNotFound),
            Ok(_) => Ok(()),
            Err(e) => {
                secure_log::secure_error!("Failed to rotate refresh token", e);
                Err(e)
            }
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(self.db_conn.get_pool())
            .await
            .map(|done| done.rows_affected())
    }
}
