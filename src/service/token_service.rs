use crate::config::settings::{JwtSettings, TokenSettings};
use crate::dto::token_dto::TokenClaimsDto;
use crate::error::token_error::TokenError;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ISSUER: &str = "storefront-auth";

/// Signed envelope around the claims callers care about
#[derive(Debug, Serialize, Deserialize)]
struct SignedClaims {
    #[serde(flatten)]
    claims: TokenClaimsDto,
    iat: i64,
    exp: i64,
    iss: String,
    jti: String,
}

fn expiry_after(now: DateTime<Utc>, expires_in_seconds: i64) -> Result<DateTime<Utc>, TokenError> {
    TimeDelta::try_seconds(expires_in_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| TokenError::TokenCreationError("Token expiration calculation overflow".to_string()))
}

fn sign(claims: &TokenClaimsDto, secret: &str, now: DateTime<Utc>, exp: DateTime<Utc>) -> Result<String, TokenError> {
    let signed = SignedClaims {
        claims: claims.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
        iss: ISSUER.to_string(),
        // Unique per token so two tokens minted in the same second differ
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &signed,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::TokenCreationError(e.to_string()))
}

/// Sign `claims` with `secret`, valid for `expires_in_seconds` from now.
pub fn create_token(claims: &TokenClaimsDto, secret: &str, expires_in_seconds: i64) -> Result<String, TokenError> {
    let now = Utc::now();
    sign(claims, secret, now, expiry_after(now, expires_in_seconds)?)
}

/// Check signature, issuer and expiry, returning the embedded claims.
pub fn verify_token(token: &str, secret: &str) -> Result<TokenClaimsDto, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss"]);
    validation.validate_exp = true;
    validation.validate_nbf = false;
    validation.leeway = 0;

    let data = decode::<SignedClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims.claims)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
    VerifyEmail,
}

#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies the three token purposes, each with its own secret.
#[derive(Clone)]
pub struct TokenService {
    settings: JwtSettings,
}

impl TokenService {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    fn settings_for(&self, kind: TokenKind) -> &TokenSettings {
        match kind {
            TokenKind::Access => &self.settings.access,
            TokenKind::Refresh => &self.settings.refresh,
            TokenKind::VerifyEmail => &self.settings.verify_email,
        }
    }

    pub fn issue(&self, kind: TokenKind, claims: &TokenClaimsDto) -> Result<IssuedToken, TokenError> {
        let settings = self.settings_for(kind);
        let now = Utc::now();
        let expires_at = expiry_after(now, settings.ttl_seconds)?;
        Ok(IssuedToken {
            token: sign(claims, &settings.secret, now, expires_at)?,
            expires_at,
        })
    }

    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaimsDto, TokenError> {
        verify_token(token, &self.settings_for(kind).secret)
    }

    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.settings.refresh.ttl_seconds
    }
}
