use crate::dto::token_dto::{SignOutResponseDto, SigninResponseDto, TokenRefreshResponseDto};
use crate::dto::user_dto::{
    ResendVerificationRequestDto, SessionUserDto, SigninRequestDto, SignupRequestDto, UserIdDto, UserReadDto,
    VerifyEmailRequestDto,
};
use crate::error::{AppError, request_error::ValidatedRequest, token_error::TokenError};
use crate::response::app_response::SuccessResponse;
use crate::service::session_cookie;
use crate::state::auth_state::AuthState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use tracing::info;

fn refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(session_cookie::extract)
}

pub async fn signup(
    State(state): State<AuthState>,
    ValidatedRequest(payload): ValidatedRequest<SignupRequestDto>,
) -> Result<SuccessResponse<UserIdDto>, AppError> {
    let created = state.auth_service.signup(payload, None).await?;

    Ok(SuccessResponse::send(created)
        .with_status(StatusCode::CREATED)
        .with_message("User created successfully! Please check your email to verify your account."))
}

pub async fn verify_email(
    State(state): State<AuthState>,
    ValidatedRequest(payload): ValidatedRequest<VerifyEmailRequestDto>,
) -> Result<SuccessResponse<UserReadDto>, AppError> {
    let user = state.auth_service.verify_email(&payload.token).await?;
    Ok(SuccessResponse::send(UserReadDto::from(user)).with_message("Email verified successfully"))
}

pub async fn resend_verification(
    State(state): State<AuthState>,
    ValidatedRequest(payload): ValidatedRequest<ResendVerificationRequestDto>,
) -> Result<SuccessResponse<UserIdDto>, AppError> {
    let user = state.auth_service.resend_verification(&payload.email).await?;
    Ok(SuccessResponse::send(user).with_message("Verification email sent"))
}

pub async fn signin(
    State(state): State<AuthState>,
    headers: HeaderMap,
    ValidatedRequest(payload): ValidatedRequest<SigninRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state
        .auth_service
        .signin(payload, refresh_cookie(&headers))
        .await?;

    let cookie = session_cookie::create(
        &pair.refresh_token,
        state.auth_service.refresh_ttl_seconds(),
        state.secure_cookies,
    );
    let body = SuccessResponse::send(SigninResponseDto {
        access_token: pair.access_token,
        id: pair.id,
    })
    .with_message("User signed in successfully");

    Ok(([(header::SET_COOKIE, cookie)], body))
}

pub async fn update_token(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = refresh_cookie(&headers).ok_or(TokenError::MissingRefreshToken)?;
    let refreshed = state.auth_service.update_token(&token).await?;

    let cookie = session_cookie::create(
        &refreshed.refresh_token,
        state.auth_service.refresh_ttl_seconds(),
        state.secure_cookies,
    );
    let body = SuccessResponse::send(TokenRefreshResponseDto {
        access_token: refreshed.access_token,
        role: refreshed.role,
    })
    .with_message("Token refreshed successfully");

    Ok(([(header::SET_COOKIE, cookie)], body))
}

/// Runs behind the access-token guard; the cookie is cleared whether or not a session was found.
pub async fn sign_out(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let signed_out = match refresh_cookie(&headers) {
        Some(token) => state.auth_service.sign_out(&token).await?,
        None => false,
    };
    info!("Signout completed, session removed: {}", signed_out);

    let body = SuccessResponse::send(SignOutResponseDto { signed_out }).with_message("User signed out successfully");
    Ok(([(header::SET_COOKIE, session_cookie::clear(state.secure_cookies))], body))
}

pub async fn check_user(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<SuccessResponse<SessionUserDto>, AppError> {
    let token = refresh_cookie(&headers).ok_or(TokenError::MissingRefreshToken)?;
    let user = state.auth_service.check_user(&token).await?;
    Ok(SuccessResponse::send(user).with_message("User retrieved successfully"))
}
