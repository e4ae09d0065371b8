use crate::config::database::{Database, DatabaseTrait};
use crate::config::logging::secure_log;
use crate::entity::user::{NewUser, SessionUser, User};
use crate::entity::user_detail::{IMAGE_FILE, Image, LOCAL_DISK, UploadedImage, UserDetail};
use async_trait::async_trait;
use sqlx::Error;
use std::sync::Arc;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, name, email, phone_number, password, role, is_verified, created_at, updated_at";

#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error>;
    async fn email_or_phone_exists(&self, email: &str, phone_number: &str) -> Result<bool, Error>;
    async fn create(&self, new_user: NewUser) -> Result<User, Error>;
    async fn mark_verified(&self, email: &str) -> Result<Option<User>, Error>;
    async fn attach_image(&self, user_id: Uuid, image: &UploadedImage) -> Result<UserDetail, Error>;
    async fn find_by_refresh_token_hash(&self, token_hash: &str) -> Result<Option<SessionUser>, Error>;
}

#[derive(Clone)]
pub struct UserRepository {
    pub(crate) db_conn: Arc<Database>,
}

impl UserRepository {
    pub fn new(db_conn: &Arc<Database>) -> Self {
        Self {
            db_conn: Arc::clone(db_conn),
        }
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let start = std::time::Instant::now();

        let result = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(self.db_conn.get_pool())
            .await;

        match &result {
            Ok(_) => secure_log::sensitive_debug!("User lookup by email completed in {:?}", start.elapsed()),
            Err(e) => secure_log::secure_error!("User lookup by email failed", e),
        }
        result
    }

    async fn email_or_phone_exists(&self, email: &str, phone_number: &str) -> Result<bool, Error> {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 OR phone_number = $2)"
        )
        .bind(email)
        .bind(phone_number)
        .fetch_one(self.db_conn.get_pool())
        .await;

        match &result {
            Ok(_) => secure_log::sensitive_debug!("Email/phone existence check completed in {:?}", start.elapsed()),
            Err(e) => secure_log::secure_error!("Email/phone existence check failed", e),
        }
        result
    }

    async fn create(&self, new_user: NewUser) -> Result<User, Error> {
        let start = std::time::Instant::now();

        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, phone_number, password, role, is_verified) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'customer'::user_role), FALSE) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.phone_number)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .fetch_one(self.db_conn.get_pool())
        .await;

        match &result {
            Ok(user) => secure_log::sensitive_debug!("User {} inserted in {:?}", user.id, start.elapsed()),
            Err(e) => secure_log::secure_error!("Failed to insert user", e),
        }
        result
    }

    async fn mark_verified(&self, email: &str) -> Result<Option<User>, Error> {
        let result = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE email = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(self.db_conn.get_pool())
        .await;

        if let Err(e) = &result {
            secure_log::secure_error!("Failed to mark user as verified", e);
        }
        result
    }

    async fn attach_image(&self, user_id: Uuid, image: &UploadedImage) -> Result<UserDetail, Error> {
        // Image and detail rows are written together or not at all
        let mut tx = self.db_conn.get_pool().begin().await?;

        let stored = sqlx::query_as::<_, Image>(
            "INSERT INTO images (id, disk_type, modified_name, original_name, path, file_type) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, disk_type, modified_name, original_name, path, file_type, created_at"
        )
        .bind(Uuid::now_v7())
        .bind(LOCAL_DISK)
        .bind(&image.modified_name)
        .bind(&image.original_name)
        .bind(Image::storage_path(&image.modified_name))
        .bind(IMAGE_FILE)
        .fetch_one(&mut *tx)
        .await?;

        let detail = sqlx::query_as::<_, UserDetail>(
            "INSERT INTO user_details (id, user_id, image_id) VALUES ($1, $2, $3) \
             RETURNING id, user_id, image_id, created_at"
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(stored.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        secure_log::sensitive_debug!("Profile image {} attached to user {}", stored.path, user_id);
        Ok(detail)
    }

    async fn find_by_refresh_token_hash(&self, token_hash: &str) -> Result<Option<SessionUser>, Error> {
        let start = std::time::Instant::now();

        let result = sqlx::query_as::<_, SessionUser>(
            "SELECT u.id, u.email, u.role, u.is_verified FROM users u \
             WHERE EXISTS (SELECT 1 FROM refresh_tokens rt WHERE rt.user_id = u.id AND rt.token_hash = $1)"
        )
        .bind(token_hash)
        .fetch_optional(self.db_conn.get_pool())
        .await;

        match &result {
            Ok(user) => {
                if user.is_some() {
                    tracing::info!("User found by refresh token hash in {:?}", start.elapsed());
                } else {
                    tracing::info!("No user found with refresh token hash in {:?}", start.elapsed());
                }
            }
            Err(e) => secure_log::secure_error!("Error finding user by refresh token hash", e),
        }
        result
    }
}
