use crate::entity::user::{Role, SessionUser, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequestDto {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,
    #[validate(email(message = "Email format is invalid"))]
    #[validate(length(
        max = 254,
        message = "Email must not exceed 254 characters"
    ))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 20,
        message = "Phone number must be between 6 and 20 characters"
    ))]
    pub phone_number: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password must be between 6 and 128 characters"
    ))]
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct SigninRequestDto {
    #[validate(email(message = "Email format is invalid"))]
    pub email: String,
    #[validate(length(
        min = 1,
        max = 128,
        message = "Password is required"
    ))]
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct VerifyEmailRequestDto {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct ResendVerificationRequestDto {
    #[validate(email(message = "Email format is invalid"))]
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdDto {
    pub id: Uuid,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReadDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub role: Role,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserReadDto {
    fn from(model: User) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            phone_number: model.phone_number,
            role: model.role,
            is_verified: model.is_verified,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUserDto {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
}

impl From<SessionUser> for SessionUserDto {
    fn from(model: SessionUser) -> Self {
        Self {
            id: model.id,
            email: model.email,
            role: model.role,
            is_verified: model.is_verified,
        }
    }
}

impl std::fmt::Debug for SigninRequestDto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signin")
            .field("email", &self.email)
            .finish()
    }
}

impl std::fmt::Debug for SignupRequestDto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signup")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("role", &self.role)
            .finish()
    }
}
