use crate::entity::user::User;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A stored refresh token joined with the user that owns it.
#[derive(Clone, Debug)]
pub struct RefreshTokenWithUser {
    pub token: RefreshToken,
    pub user: User,
}
