use super::{auth, health};
use crate::config::database::Database;
use crate::config::settings::{ConfigError, Settings};
use crate::middleware::rate_limit::RateLimitState;
use crate::service::auth_service::AuthService;
use crate::state::auth_state::AuthState;
use crate::state::token_state::TokenState;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn routes(db_conn: Arc<Database>, auth_service: Arc<AuthService>, settings: &Settings) -> Result<Router, ConfigError> {
    let auth_state = AuthState::new(auth_service, settings);
    let token_state = TokenState::new(&settings.jwt);
    let rate_limit_state = RateLimitState::per_minute(settings.rate_limit_requests_per_minute);

    let api_router = Router::new()
        .nest("/auth", auth::routes(token_state, rate_limit_state).with_state(auth_state))
        .merge(health::routes().with_state(db_conn));

    let app_router = Router::new()
        .nest("/api/v1", api_router)
        .layer(cors_layer(&settings.client_url)?)
        .layer(TraceLayer::new_for_http());

    Ok(app_router)
}

/// The storefront client calls with credentials, so only its own origin is allowed.
fn cors_layer(client_url: &str) -> Result<CorsLayer, ConfigError> {
    let origin = HeaderValue::from_str(client_url).map_err(|_| ConfigError::Invalid {
        key: "CLIENT_URL",
        value: client_url.to_string(),
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}
