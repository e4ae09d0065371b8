use crate::config::logging::secure_log;
use crate::error::{AppError, token_error::TokenError};
use crate::service::token_service::TokenKind;
use crate::state::token_state::TokenState;
use axum::extract::{Request, State};
use axum::http;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

/// Require a valid access token; its claims are stored in the request extensions.
pub async fn auth(
    State(state): State<TokenState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_ip = req
        .headers()
        .get("x-forwarded-for")
        .or_else(|| req.headers().get("x-real-ip"))
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let token = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| {
            secure_log::secure_error!(format!("Missing authorization header from IP: {}", client_ip));
            TokenError::MissingToken
        })?;

    if token.is_empty() {
        secure_log::secure_error!(format!("Empty authorization token from IP: {}", client_ip));
        return Err(TokenError::MissingToken.into());
    }

    match state.token_service.verify(TokenKind::Access, token) {
        Ok(claims) => {
            info!("SECURITY: Access token accepted for user ID: {} from IP: {}", claims.id, client_ip);
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(TokenError::TokenExpired) => {
            secure_log::secure_error!(format!("Expired access token from IP: {}", client_ip));
            Err(TokenError::TokenExpired.into())
        }
        Err(_) => {
            secure_log::secure_error!(format!("Invalid access token from IP: {}", client_ip));
            Err(TokenError::InvalidToken.into())
        }
    }
}
