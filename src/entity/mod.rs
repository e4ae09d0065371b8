pub mod refresh_token;
pub mod user;
pub mod user_detail;
