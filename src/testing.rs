//! Test support: an in-memory store behind both repository traits, mail senders
//! that never touch the network, and a ready-wired `AuthService`.

use crate::config::parameter::Parameters;
use crate::config::settings::Settings;
use crate::entity::refresh_token::{RefreshToken, RefreshTokenWithUser};
use crate::entity::user::{NewUser, SessionUser, User};
use crate::entity::user_detail::{IMAGE_FILE, Image, LOCAL_DISK, UploadedImage, UserDetail};
use crate::error::mail_error::MailError;
use crate::repository::refresh_token_repository::RefreshTokenRepositoryTrait;
use crate::repository::user_repository::UserRepositoryTrait;
use crate::service::auth_service::AuthService;
use crate::service::mail_service::{EmailMessage, MailDispatcher, MailSender};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::Error;
use sqlx::error::{DatabaseError, ErrorKind};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub fn test_settings() -> Settings {
    let parameters = Parameters::from_pairs([
        ("ENV", "test"),
        ("DATABASE_URL", "postgres://localhost/storefront_test"),
        ("JWT_ACCESS_SECRET", "test-access-secret-test-access-secret"),
        ("JWT_REFRESH_SECRET", "test-refresh-secret-test-refresh-secret"),
        ("JWT_EMAIL_VERIFY_SECRET", "test-verify-secret-test-verify-secret"),
        ("SMTP_USERNAME", "shop@example.com"),
        ("SMTP_PASSWORD", "app-password"),
        ("BCRYPT_COST", "4"),
    ]);
    Settings::from_parameters(&parameters).expect("test settings are valid")
}

/// What Postgres reports when an insert hits a unique index.
#[derive(Debug)]
pub struct UniqueViolation {
    constraint: &'static str,
}

impl UniqueViolation {
    pub fn error(constraint: &'static str) -> Error {
        Error::Database(Box::new(Self { constraint }))
    }
}

impl fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate key value violates unique constraint \"{}\"", self.constraint)
    }
}

impl std::error::Error for UniqueViolation {}

impl DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.constraint)
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::UniqueViolation
    }
}

/// Users, images and refresh tokens kept in DashMaps.
#[derive(Default)]
pub struct InMemoryStore {
    users: DashMap<Uuid, User>,
    images: DashMap<Uuid, Image>,
    refresh_tokens: DashMap<Uuid, RefreshToken>,
}

impl InMemoryStore {
    pub fn user(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|entry| entry.clone())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn image_for(&self, user_id: Uuid) -> Option<Image> {
        self.images.get(&user_id).map(|entry| entry.clone())
    }

    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }

    pub fn tokens_for(&self, user_id: Uuid) -> usize {
        self.refresh_tokens
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .count()
    }

    pub fn insert_refresh_token(&self, user_id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> RefreshToken {
        let token = RefreshToken {
            id: Uuid::now_v7(),
            token_hash: token_hash.to_string(),
            user_id,
            expires_at,
            created_at: Utc::now(),
        };
        self.refresh_tokens.insert(token.id, token.clone());
        token
    }

    fn user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .iter()
            .find(|entry| entry.email == email)
            .map(|entry| entry.clone())
    }

    fn token_by_hash(&self, token_hash: &str) -> Option<RefreshToken> {
        self.refresh_tokens
            .iter()
            .find(|entry| entry.token_hash == token_hash)
            .map(|entry| entry.clone())
    }

    fn remove_where(&self, keep: impl Fn(&RefreshToken) -> bool) -> u64 {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|_, token| keep(token));
        (before - self.refresh_tokens.len()) as u64
    }
}

#[async_trait]
impl UserRepositoryTrait for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self.user_by_email(email))
    }

    async fn email_or_phone_exists(&self, email: &str, phone_number: &str) -> Result<bool, Error> {
        Ok(self
            .users
            .iter()
            .any(|entry| entry.email == email || entry.phone_number == phone_number))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, Error> {
        if self.user_by_email(&new_user.email).is_some() {
            return Err(UniqueViolation::error("users_email_key"));
        }
        if self.users.iter().any(|entry| entry.phone_number == new_user.phone_number) {
            return Err(UniqueViolation::error("users_phone_number_key"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            name: new_user.name,
            email: new_user.email,
            phone_number: new_user.phone_number,
            password: new_user.password_hash,
            role: new_user.role.unwrap_or_default(),
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn mark_verified(&self, email: &str) -> Result<Option<User>, Error> {
        let Some(mut entry) = self.users.iter_mut().find(|entry| entry.email == email) else {
            return Ok(None);
        };
        entry.is_verified = true;
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }

    async fn attach_image(&self, user_id: Uuid, image: &UploadedImage) -> Result<UserDetail, Error> {
        let stored = Image {
            id: Uuid::now_v7(),
            disk_type: LOCAL_DISK.to_string(),
            modified_name: image.modified_name.clone(),
            original_name: image.original_name.clone(),
            path: Image::storage_path(&image.modified_name),
            file_type: IMAGE_FILE.to_string(),
            created_at: Utc::now(),
        };
        let detail = UserDetail {
            id: Uuid::now_v7(),
            user_id,
            image_id: Some(stored.id),
            created_at: Utc::now(),
        };
        self.images.insert(user_id, stored);
        Ok(detail)
    }

    async fn find_by_refresh_token_hash(&self, token_hash: &str) -> Result<Option<SessionUser>, Error> {
        Ok(self
            .token_by_hash(token_hash)
            .and_then(|token| self.user(token.user_id))
            .map(|user| SessionUser {
                id: user.id,
                email: user.email,
                role: user.role,
                is_verified: user.is_verified,
            }))
    }
}

#[async_trait]
impl RefreshTokenRepositoryTrait for InMemoryStore {
    async fn create(&self, user_id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<RefreshToken, Error> {
        Ok(self.insert_refresh_token(user_id, token_hash, expires_at))
    }

    async fn find_for_user(&self, token_hash: &str, user_id: Uuid) -> Result<Option<RefreshToken>, Error> {
        Ok(self.token_by_hash(token_hash).filter(|token| token.user_id == user_id))
    }

    async fn find_with_user(&self, token_hash: &str) -> Result<Option<RefreshTokenWithUser>, Error> {
        Ok(self.token_by_hash(token_hash).and_then(|token| {
            self.user(token.user_id)
                .map(|user| RefreshTokenWithUser { token, user })
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, Error> {
        Ok(self.refresh_tokens.remove(&id).is_some())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, Error> {
        Ok(self.remove_where(|token| token.user_id != user_id))
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<u64, Error> {
        Ok(self.remove_where(|token| token.token_hash != token_hash))
    }

    async fn rotate(&self, id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<(), Error> {
        let mut token = self.refresh_tokens.get_mut(&id).ok_or(Error::RowNotFound)?;
        token.token_hash = token_hash.to_string();
        token.expires_at = expires_at;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        Ok(self.remove_where(|token| token.expires_at > now))
    }
}

/// Forwards every message to an unbounded channel the test can read.
pub struct ChannelMailSender {
    outbox: mpsc::UnboundedSender<EmailMessage>,
}

impl ChannelMailSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EmailMessage>) {
        let (outbox, receiver) = mpsc::unbounded_channel();
        (Self { outbox }, receiver)
    }
}

#[async_trait]
impl MailSender for ChannelMailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        self.outbox
            .send(message)
            .map_err(|e| MailError::Rejected(e.to_string()))
    }
}

/// Rejects everything, counting attempts.
#[derive(Default)]
pub struct FailingMailSender {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl MailSender for FailingMailSender {
    async fn send(&self, _message: EmailMessage) -> Result<(), MailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MailError::Rejected("relay unavailable".to_string()))
    }
}

/// Pull the verification token out of a rendered verification mail.
pub fn token_from_mail(message: &EmailMessage) -> String {
    message
        .html
        .split("token=")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .expect("mail carries a verification link")
        .to_string()
}

pub struct TestContext {
    pub service: AuthService,
    pub store: Arc<InMemoryStore>,
    pub outbox: mpsc::UnboundedReceiver<EmailMessage>,
    pub settings: Settings,
}

impl TestContext {
    /// Must be called inside a tokio runtime; the mail worker is spawned here.
    pub fn new() -> Self {
        let settings = test_settings();
        let store = Arc::new(InMemoryStore::default());
        let (sender, outbox) = ChannelMailSender::new();
        let (mailer, _worker) = MailDispatcher::start(Arc::new(sender), CancellationToken::new());

        let service = AuthService::new(store.clone(), store.clone(), &settings, mailer);
        Self {
            service,
            store,
            outbox,
            settings,
        }
    }
}
