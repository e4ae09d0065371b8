use crate::config::logging::secure_log;
use crate::config::settings::Settings;
use crate::dto::token_dto::{RefreshedTokenDto, TokenClaimsDto, TokenPairDto};
use crate::dto::user_dto::{SessionUserDto, SigninRequestDto, SignupRequestDto, UserIdDto};
use crate::entity::user::{NewUser, User};
use crate::entity::user_detail::UploadedImage;
use crate::error::AppError;
use crate::error::token_error::TokenError;
use crate::error::user_error::UserError;
use crate::repository::refresh_token_repository::RefreshTokenRepositoryTrait;
use crate::repository::user_repository::UserRepositoryTrait;
use crate::service::mail_service::{EmailMessage, MailDispatcher, VerificationPurpose, verification_link};
use crate::service::password_service::PasswordService;
use crate::service::refresh_token_service::hash_refresh_token;
use crate::service::token_service::{TokenKind, TokenService};
use std::sync::Arc;
use tracing::{info, warn};

/// Account lifecycle and session management on top of the user and refresh-token stores.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepositoryTrait>,
    refresh_tokens: Arc<dyn RefreshTokenRepositoryTrait>,
    tokens: TokenService,
    passwords: PasswordService,
    mailer: MailDispatcher,
    client_url: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepositoryTrait>,
        refresh_tokens: Arc<dyn RefreshTokenRepositoryTrait>,
        settings: &Settings,
        mailer: MailDispatcher,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            tokens: TokenService::new(&settings.jwt),
            passwords: PasswordService::new(settings.bcrypt_cost),
            mailer,
            client_url: settings.client_url.clone(),
        }
    }

    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.tokens.refresh_ttl_seconds()
    }

    pub async fn signup(&self, payload: SignupRequestDto, image: Option<UploadedImage>) -> Result<UserIdDto, AppError> {
        if self
            .users
            .email_or_phone_exists(&payload.email, &payload.phone_number)
            .await?
        {
            return Err(UserError::UserAlreadyExists)?;
        }

        let password = payload
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(UserError::PasswordRequired)?;
        let password_hash = self.passwords.hash(password).await?;

        let user = self
            .users
            .create(NewUser {
                name: payload.name,
                email: payload.email,
                phone_number: payload.phone_number,
                password_hash,
                role: payload.role,
            })
            .await?;

        if let Some(image) = image {
            self.users.attach_image(user.id, &image).await?;
        }

        self.send_verification(&user, VerificationPurpose::Welcome)?;
        info!("New account registered with ID: {}", user.id);

        Ok(UserIdDto { id: user.id })
    }

    /// Verification tokens are not consumed; a repeated call with a live token succeeds.
    pub async fn verify_email(&self, token: &str) -> Result<User, AppError> {
        let claims = self.tokens.verify(TokenKind::VerifyEmail, token)?;
        let email = claims.email.ok_or(UserError::UserNotFound)?;

        let user = self
            .users
            .mark_verified(&email)
            .await?
            .ok_or(UserError::UserNotFound)?;

        info!("Email verified for user ID: {}", user.id);
        Ok(user)
    }

    pub async fn resend_verification(&self, email: &str) -> Result<UserIdDto, AppError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(UserError::UserNotFound)?;

        if user.is_verified {
            return Err(UserError::AlreadyVerified)?;
        }

        self.send_verification(&user, VerificationPurpose::Resend)?;
        Ok(UserIdDto { id: user.id })
    }

    /// `previous_refresh_token` is whatever refresh token the client still holds, if any.
    pub async fn signin(
        &self,
        payload: SigninRequestDto,
        previous_refresh_token: Option<String>,
    ) -> Result<TokenPairDto, AppError> {
        let user = self
            .users
            .find_by_email(&payload.email)
            .await?
            .ok_or(UserError::UserNotFound)?;

        if !user.is_verified {
            return Err(UserError::NotVerified)?;
        }

        if !self.passwords.verify(&payload.password, &user.password).await? {
            warn!("SECURITY: Failed signin attempt for user ID: {}", user.id);
            return Err(UserError::IncorrectPassword)?;
        }

        if let Some(previous) = previous_refresh_token {
            let previous_hash = hash_refresh_token(&previous);
            match self.refresh_tokens.find_for_user(&previous_hash, user.id).await? {
                Some(stored) => {
                    self.refresh_tokens.delete(stored.id).await?;
                }
                None => {
                    // Not ours or already rotated away: treat it as reuse and end every session
                    secure_log::secure_error!(format!(
                        "SECURITY: Refresh token reuse detected at signin for user ID: {}",
                        user.id
                    ));
                    self.refresh_tokens.delete_all_for_user(user.id).await?;
                }
            }
        }

        let access_token = self.tokens.issue(TokenKind::Access, &session_claims(&user))?;
        let refresh_token = self.tokens.issue(
            TokenKind::Refresh,
            &TokenClaimsDto {
                id: user.id,
                role: user.role,
                email: None,
            },
        )?;

        self.refresh_tokens
            .create(user.id, &hash_refresh_token(&refresh_token.token), refresh_token.expires_at)
            .await?;

        info!("SECURITY: Signin succeeded for user ID: {}", user.id);
        Ok(TokenPairDto {
            access_token: access_token.token,
            refresh_token: refresh_token.token,
            id: user.id,
        })
    }

    /// Exchange a refresh token for a new pair, rotating the stored row in place.
    pub async fn update_token(&self, token: &str) -> Result<RefreshedTokenDto, AppError> {
        let stored = self
            .refresh_tokens
            .find_with_user(&hash_refresh_token(token))
            .await?
            .ok_or(TokenError::Unauthorized)?;

        let claims = self.tokens.verify(TokenKind::Refresh, token)?;
        if claims.id != stored.user.id {
            warn!("SECURITY: Refresh token subject mismatch for user ID: {}", stored.user.id);
            return Err(TokenError::Unauthorized)?;
        }

        let session = session_claims(&stored.user);
        let access_token = self.tokens.issue(TokenKind::Access, &session)?;
        let refresh_token = self.tokens.issue(TokenKind::Refresh, &session)?;

        self.refresh_tokens
            .rotate(
                stored.token.id,
                &hash_refresh_token(&refresh_token.token),
                refresh_token.expires_at,
            )
            .await?;

        info!("SECURITY: Refresh token rotated for user ID: {}", stored.user.id);
        Ok(RefreshedTokenDto {
            access_token: access_token.token,
            refresh_token: refresh_token.token,
            role: stored.user.role,
        })
    }

    /// Returns whether a stored session was actually removed.
    pub async fn sign_out(&self, token: &str) -> Result<bool, AppError> {
        let removed = self.refresh_tokens.delete_by_hash(&hash_refresh_token(token)).await?;
        if removed > 0 {
            info!("SECURITY: Session signed out");
        }
        Ok(removed > 0)
    }

    pub async fn check_user(&self, token: &str) -> Result<SessionUserDto, AppError> {
        let user = self
            .users
            .find_by_refresh_token_hash(&hash_refresh_token(token))
            .await?
            .ok_or(TokenError::Unauthorized)?;

        let claims = self.tokens.verify(TokenKind::Refresh, token)?;
        if claims.id != user.id {
            return Err(TokenError::Unauthorized)?;
        }

        Ok(SessionUserDto::from(user))
    }

    fn send_verification(&self, user: &User, purpose: VerificationPurpose) -> Result<(), AppError> {
        let issued = self.tokens.issue(TokenKind::VerifyEmail, &session_claims(user))?;
        let link = verification_link(&self.client_url, &issued.token);

        self.mailer
            .dispatch(EmailMessage::verification(&user.email, &user.name, &link, purpose));
        secure_log::sensitive_debug!("Verification mail queued for {}", user.email);
        Ok(())
    }
}

fn session_claims(user: &User) -> TokenClaimsDto {
    TokenClaimsDto {
        id: user.id,
        role: user.role,
        email: Some(user.email.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::user::Role;
    use crate::error::ErrorKind;
    use crate::service::token_service::{create_token, verify_token};
    use crate::testing::{TestContext, token_from_mail};
    use chrono::{Duration, Utc};

    fn signup_payload(email: &str, phone: &str) -> SignupRequestDto {
        SignupRequestDto {
            name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            phone_number: phone.to_string(),
            password: Some("secret123".to_string()),
            role: None,
        }
    }

    fn signin_payload(email: &str, password: &str) -> SigninRequestDto {
        SigninRequestDto {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    async fn verified_user(ctx: &mut TestContext, email: &str, phone: &str) -> uuid::Uuid {
        let created = ctx.service.signup(signup_payload(email, phone), None).await.unwrap();
        let mail = ctx.outbox.recv().await.unwrap();
        ctx.service.verify_email(&token_from_mail(&mail)).await.unwrap();
        created.id
    }

    #[tokio::test]
    async fn test_signup_creates_unverified_user_and_sends_mail() {
        let mut ctx = TestContext::new();
        let created = ctx
            .service
            .signup(signup_payload("ada@example.com", "01700000001"), None)
            .await
            .unwrap();

        let user = ctx.store.user(created.id).unwrap();
        assert!(!user.is_verified);
        assert_eq!(user.role, Role::Customer);
        assert_ne!(user.password, "secret123");

        let mail = ctx.outbox.recv().await.unwrap();
        assert_eq!(mail.to, "ada@example.com");
        assert!(mail.html.contains("http://localhost:3000/auth/verify-email?token="));

        let claims = verify_token(&token_from_mail(&mail), &ctx.settings.jwt.verify_email.secret).unwrap();
        assert_eq!(claims.id, created.id);
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_signup_keeps_requested_role() {
        let ctx = TestContext::new();
        let mut payload = signup_payload("admin@example.com", "01700000002");
        payload.role = Some(Role::Admin);

        let created = ctx.service.signup(payload, None).await.unwrap();
        assert_eq!(ctx.store.user(created.id).unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn test_signup_rejects_duplicate_email_or_phone() {
        let ctx = TestContext::new();
        ctx.service
            .signup(signup_payload("ada@example.com", "01700000001"), None)
            .await
            .unwrap();

        let same_email = ctx
            .service
            .signup(signup_payload("ada@example.com", "01799999999"), None)
            .await
            .unwrap_err();
        assert_eq!(same_email.kind(), ErrorKind::Conflict);

        let same_phone = ctx
            .service
            .signup(signup_payload("other@example.com", "01700000001"), None)
            .await
            .unwrap_err();
        assert_eq!(same_phone.kind(), ErrorKind::Conflict);

        let same_both = ctx
            .service
            .signup(signup_payload("ada@example.com", "01700000001"), None)
            .await
            .unwrap_err();
        assert_eq!(same_both.kind(), ErrorKind::Conflict);
        assert_eq!(ctx.store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_insert_racing_a_signup_is_a_conflict() {
        let ctx = TestContext::new();
        ctx.service
            .signup(signup_payload("ada@example.com", "01700000001"), None)
            .await
            .unwrap();

        // The existence check already passed for the losing request
        for (email, phone) in [
            ("ada@example.com", "01799999999"),
            ("other@example.com", "01700000001"),
        ] {
            let error = UserRepositoryTrait::create(
                ctx.store.as_ref(),
                NewUser {
                    name: "Grace Hopper".to_string(),
                    email: email.to_string(),
                    phone_number: phone.to_string(),
                    password_hash: "$2b$04$hash".to_string(),
                    role: None,
                },
            )
            .await
            .unwrap_err();
            assert_eq!(AppError::from(error).kind(), ErrorKind::Conflict);
        }
        assert_eq!(ctx.store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_signup_requires_password() {
        let ctx = TestContext::new();
        let mut payload = signup_payload("ada@example.com", "01700000001");
        payload.password = None;

        let error = ctx.service.signup(payload, None).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(ctx.store.user_count(), 0);
    }

    #[tokio::test]
    async fn test_signup_attaches_profile_image() {
        let ctx = TestContext::new();
        let image = UploadedImage {
            modified_name: "1700000000-avatar.png".to_string(),
            original_name: "avatar.png".to_string(),
        };

        let created = ctx
            .service
            .signup(signup_payload("ada@example.com", "01700000001"), Some(image))
            .await
            .unwrap();

        let stored = ctx.store.image_for(created.id).unwrap();
        assert_eq!(stored.path, "users/1700000000-avatar.png");
        assert_eq!(stored.disk_type, "LOCAL");
        assert_eq!(stored.file_type, "IMAGE");
    }

    #[tokio::test]
    async fn test_verify_email_is_repeatable() {
        let mut ctx = TestContext::new();
        let created = ctx
            .service
            .signup(signup_payload("ada@example.com", "01700000001"), None)
            .await
            .unwrap();
        let token = token_from_mail(&ctx.outbox.recv().await.unwrap());

        let user = ctx.service.verify_email(&token).await.unwrap();
        assert!(user.is_verified);
        assert_eq!(user.id, created.id);

        let again = ctx.service.verify_email(&token).await.unwrap();
        assert!(again.is_verified);
    }

    #[tokio::test]
    async fn test_verify_email_rejects_bad_tokens() {
        let ctx = TestContext::new();
        let created = ctx
            .service
            .signup(signup_payload("ada@example.com", "01700000001"), None)
            .await
            .unwrap();

        let claims = TokenClaimsDto {
            id: created.id,
            role: Role::Customer,
            email: Some("ada@example.com".to_string()),
        };
        let expired = create_token(&claims, &ctx.settings.jwt.verify_email.secret, -10).unwrap();
        let wrong_secret = create_token(&claims, &ctx.settings.jwt.access.secret, 60).unwrap();

        for token in [expired.as_str(), wrong_secret.as_str(), "garbage"] {
            let error = ctx.service.verify_email(token).await.unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Unauthenticated);
        }
        assert!(!ctx.store.user(created.id).unwrap().is_verified);
    }

    #[tokio::test]
    async fn test_verify_email_without_email_claim_is_not_found() {
        let ctx = TestContext::new();
        let claims = TokenClaimsDto {
            id: uuid::Uuid::now_v7(),
            role: Role::Customer,
            email: None,
        };
        let token = create_token(&claims, &ctx.settings.jwt.verify_email.secret, 60).unwrap();

        let error = ctx.service.verify_email(&token).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_resend_verification() {
        let mut ctx = TestContext::new();

        let missing = ctx.service.resend_verification("nobody@example.com").await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let created = ctx
            .service
            .signup(signup_payload("ada@example.com", "01700000001"), None)
            .await
            .unwrap();
        let first = token_from_mail(&ctx.outbox.recv().await.unwrap());

        let resent = ctx.service.resend_verification("ada@example.com").await.unwrap();
        assert_eq!(resent.id, created.id);
        let mail = ctx.outbox.recv().await.unwrap();
        assert!(mail.html.contains("If you didn't request this"));

        // The earlier link still works
        ctx.service.verify_email(&first).await.unwrap();

        let verified = ctx.service.resend_verification("ada@example.com").await.unwrap_err();
        assert_eq!(verified.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_signin_unverified_is_forbidden_for_any_password() {
        let ctx = TestContext::new();
        ctx.service
            .signup(signup_payload("ada@example.com", "01700000001"), None)
            .await
            .unwrap();

        for password in ["secret123", "wrong-password"] {
            let error = ctx
                .service
                .signin(signin_payload("ada@example.com", password), None)
                .await
                .unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Forbidden);
        }
        assert_eq!(ctx.store.refresh_token_count(), 0);
    }

    #[tokio::test]
    async fn test_signin_unknown_user_and_wrong_password() {
        let mut ctx = TestContext::new();
        verified_user(&mut ctx, "ada@example.com", "01700000001").await;

        let unknown = ctx
            .service
            .signin(signin_payload("nobody@example.com", "secret123"), None)
            .await
            .unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::NotFound);

        let wrong = ctx
            .service
            .signin(signin_payload("ada@example.com", "not-the-password"), None)
            .await
            .unwrap_err();
        assert_eq!(wrong.kind(), ErrorKind::Unprocessable);
        assert_eq!(ctx.store.refresh_token_count(), 0);
    }

    #[tokio::test]
    async fn test_signin_issues_and_persists_tokens() {
        let mut ctx = TestContext::new();
        let id = verified_user(&mut ctx, "ada@example.com", "01700000001").await;

        let pair = ctx
            .service
            .signin(signin_payload("ada@example.com", "secret123"), None)
            .await
            .unwrap();
        assert_eq!(pair.id, id);

        let access = verify_token(&pair.access_token, &ctx.settings.jwt.access.secret).unwrap();
        assert_eq!(access.id, id);
        assert_eq!(access.email.as_deref(), Some("ada@example.com"));

        let refresh = verify_token(&pair.refresh_token, &ctx.settings.jwt.refresh.secret).unwrap();
        assert_eq!(refresh.id, id);
        assert!(refresh.email.is_none());

        let stored = ctx
            .store
            .find_for_user(&hash_refresh_token(&pair.refresh_token), id)
            .await
            .unwrap()
            .unwrap();
        let expected = Utc::now() + Duration::seconds(ctx.settings.jwt.refresh.ttl_seconds);
        assert!((stored.expires_at - expected).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn test_signin_replaces_presented_token() {
        let mut ctx = TestContext::new();
        let id = verified_user(&mut ctx, "ada@example.com", "01700000001").await;

        let first = ctx
            .service
            .signin(signin_payload("ada@example.com", "secret123"), None)
            .await
            .unwrap();
        let second = ctx
            .service
            .signin(signin_payload("ada@example.com", "secret123"), Some(first.refresh_token.clone()))
            .await
            .unwrap();

        assert_eq!(ctx.store.tokens_for(id), 1);
        assert!(
            ctx.store
                .find_for_user(&hash_refresh_token(&first.refresh_token), id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            ctx.store
                .find_for_user(&hash_refresh_token(&second.refresh_token), id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_signin_with_foreign_token_revokes_all_sessions() {
        let mut ctx = TestContext::new();
        let id = verified_user(&mut ctx, "ada@example.com", "01700000001").await;
        let other = verified_user(&mut ctx, "bob@example.com", "01700000002").await;

        let laptop = ctx
            .service
            .signin(signin_payload("ada@example.com", "secret123"), None)
            .await
            .unwrap();
        ctx.service
            .signin(signin_payload("ada@example.com", "secret123"), None)
            .await
            .unwrap();
        let bob = ctx
            .service
            .signin(signin_payload("bob@example.com", "secret123"), None)
            .await
            .unwrap();
        assert_eq!(ctx.store.tokens_for(id), 2);

        // Presenting someone else's token still signs in, but every earlier session is gone
        let fresh = ctx
            .service
            .signin(signin_payload("ada@example.com", "secret123"), Some(bob.refresh_token.clone()))
            .await
            .unwrap();

        assert_eq!(ctx.store.tokens_for(id), 1);
        assert_eq!(ctx.store.tokens_for(other), 1);
        assert!(ctx.service.update_token(&laptop.refresh_token).await.is_err());
        assert!(ctx.service.update_token(&fresh.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_token_rotates_in_place() {
        let mut ctx = TestContext::new();
        let id = verified_user(&mut ctx, "ada@example.com", "01700000001").await;
        let pair = ctx
            .service
            .signin(signin_payload("ada@example.com", "secret123"), None)
            .await
            .unwrap();

        let refreshed = ctx.service.update_token(&pair.refresh_token).await.unwrap();
        assert_eq!(refreshed.role, Role::Customer);
        assert_ne!(refreshed.refresh_token, pair.refresh_token);
        assert_eq!(ctx.store.tokens_for(id), 1);

        let access = verify_token(&refreshed.access_token, &ctx.settings.jwt.access.secret).unwrap();
        assert_eq!(access.id, id);

        let replayed = ctx.service.update_token(&pair.refresh_token).await.unwrap_err();
        assert_eq!(replayed.kind(), ErrorKind::Unauthenticated);
        assert!(ctx.service.update_token(&refreshed.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_token_rejections() {
        let mut ctx = TestContext::new();
        let ada = verified_user(&mut ctx, "ada@example.com", "01700000001").await;
        let bob = verified_user(&mut ctx, "bob@example.com", "01700000002").await;

        let unknown = ctx.service.update_token("never-issued").await.unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::Unauthenticated);

        // Stored, but signed with the wrong secret
        let claims = TokenClaimsDto {
            id: ada,
            role: Role::Customer,
            email: None,
        };
        let forged = create_token(&claims, &ctx.settings.jwt.access.secret, 60).unwrap();
        ctx.store.insert_refresh_token(ada, &hash_refresh_token(&forged), Utc::now() + Duration::hours(1));
        let error = ctx.service.update_token(&forged).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unauthenticated);

        // Valid signature, but stored under a different owner
        let adas = create_token(&claims, &ctx.settings.jwt.refresh.secret, 60).unwrap();
        ctx.store.insert_refresh_token(bob, &hash_refresh_token(&adas), Utc::now() + Duration::hours(1));
        let error = ctx.service.update_token(&adas).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn test_sign_out_and_check_user() {
        let mut ctx = TestContext::new();
        let id = verified_user(&mut ctx, "ada@example.com", "01700000001").await;
        let pair = ctx
            .service
            .signin(signin_payload("ada@example.com", "secret123"), None)
            .await
            .unwrap();

        let session = ctx.service.check_user(&pair.refresh_token).await.unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.email, "ada@example.com");
        assert!(session.is_verified);

        assert!(ctx.service.sign_out(&pair.refresh_token).await.unwrap());
        assert!(!ctx.service.sign_out(&pair.refresh_token).await.unwrap());

        let error = ctx.service.check_user(&pair.refresh_token).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unauthenticated);
        let error = ctx.service.update_token(&pair.refresh_token).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn test_check_user_rejects_mismatched_subject() {
        let mut ctx = TestContext::new();
        let ada = verified_user(&mut ctx, "ada@example.com", "01700000001").await;
        let bob = verified_user(&mut ctx, "bob@example.com", "01700000002").await;

        let claims = TokenClaimsDto {
            id: ada,
            role: Role::Customer,
            email: None,
        };
        let token = create_token(&claims, &ctx.settings.jwt.refresh.secret, 60).unwrap();
        ctx.store.insert_refresh_token(bob, &hash_refresh_token(&token), Utc::now() + Duration::hours(1));

        let error = ctx.service.check_user(&token).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unauthenticated);
    }
}
