use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const LOCAL_DISK: &str = "LOCAL";
pub const IMAGE_FILE: &str = "IMAGE";

/// Descriptor of a profile image already written by the upload layer.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadedImage {
    pub modified_name: String,
    pub original_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    pub disk_type: String,
    pub modified_name: String,
    pub original_name: String,
    pub path: String,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
}

impl Image {
    pub fn storage_path(modified_name: &str) -> String {
        format!("users/{}", modified_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
