pub mod auth_service;
pub mod mail_service;
pub mod password_service;
pub mod refresh_token_service;
pub mod session_cookie;
pub mod token_service;
