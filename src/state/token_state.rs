use crate::config::settings::JwtSettings;
use crate::service::token_service::TokenService;

#[derive(Clone)]
pub struct TokenState {
    pub token_service: TokenService,
}

impl TokenState {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            token_service: TokenService::new(settings),
        }
    }
}
