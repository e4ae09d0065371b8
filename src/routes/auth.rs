use crate::handler::auth_handler;
use crate::middleware::auth as auth_middleware;
use crate::middleware::rate_limit::{self, RateLimitState};
use crate::state::auth_state::AuthState;
use crate::state::token_state::TokenState;
use axum::routing::{get, post, put};
use axum::{Router, middleware};

pub fn routes(token_state: TokenState, rate_limit_state: RateLimitState) -> Router<AuthState> {
    let credential_routes = Router::<AuthState>::new()
        .route("/signup", post(auth_handler::signup))
        .route("/signin", post(auth_handler::signin))
        .route("/resend-verification", post(auth_handler::resend_verification))
        .route_layer(middleware::from_fn_with_state(rate_limit_state, rate_limit::rate_limit_auth));

    let guarded_routes = Router::<AuthState>::new()
        .route("/signout", post(auth_handler::sign_out))
        .route_layer(middleware::from_fn_with_state(token_state, auth_middleware::auth));

    Router::<AuthState>::new()
        .route("/verify-email", put(auth_handler::verify_email))
        .route("/token", get(auth_handler::update_token))
        .route("/user", get(auth_handler::check_user))
        .merge(credential_routes)
        .merge(guarded_routes)
}
