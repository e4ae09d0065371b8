use crate::entity::user::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by access, refresh and email-verification tokens
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaimsDto {
    pub id: Uuid,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Result of a successful signin
#[derive(Clone, Debug)]
pub struct TokenPairDto {
    pub access_token: String,
    pub refresh_token: String,
    pub id: Uuid,
}

/// Result of a successful refresh
#[derive(Clone, Debug)]
pub struct RefreshedTokenDto {
    pub access_token: String,
    pub refresh_token: String,
    pub role: Role,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninResponseDto {
    pub access_token: String,
    pub id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefreshResponseDto {
    pub access_token: String,
    pub role: Role,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutResponseDto {
    pub signed_out: bool,
}
