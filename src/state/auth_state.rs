use crate::config::settings::Settings;
use crate::service::auth_service::AuthService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthState {
    pub(crate) auth_service: Arc<AuthService>,
    /// Adds `Secure` to the refresh cookie; only set in production.
    pub(crate) secure_cookies: bool,
}

impl AuthState {
    pub fn new(auth_service: Arc<AuthService>, settings: &Settings) -> Self {
        Self {
            auth_service,
            secure_cookies: settings.environment.is_production(),
        }
    }
}
