use crate::config::duration::parse_expiration_time;
use crate::config::logging::{self, Environment};
use crate::config::parameter::Parameters;
use thiserror::Error;
use tracing::Level;

/// Minimum secret length for HS256 signing keys (256 bits)
const MIN_SECRET_BYTES: usize = 32;
/// Ten years; longer lifetimes are treated as misconfiguration
const MAX_TOKEN_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required configuration parameter '{0}' is missing")]
    Missing(&'static str),
    #[error("Configuration parameter '{key}' has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must be at least 32 bytes (256 bits), got {length}")]
    WeakSecret { key: &'static str, length: usize },
    #[error("{first} and {second} must not share the same secret")]
    SharedSecret {
        first: &'static str,
        second: &'static str,
    },
}

#[derive(Clone, Debug)]
pub struct ServerSettings {
    pub address: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_lifetime_seconds: u64,
}

/// Secret and lifetime of one token purpose.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub expires_in: String,
    pub ttl_seconds: i64,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("expires_in", &self.expires_in)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct JwtSettings {
    pub access: TokenSettings,
    pub refresh: TokenSettings,
    pub verify_email: TokenSettings,
}

#[derive(Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl std::fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .finish()
    }
}

/// Immutable application configuration, built once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub environment: Environment,
    pub log_level: Level,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub bcrypt_cost: u32,
    pub client_url: String,
    pub mail: MailSettings,
    pub rate_limit_requests_per_minute: u32,
    pub refresh_token_cleanup_interval_minutes: u64,
}

impl Settings {
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, ConfigError> {
        let environment = Environment::parse(parameters.get_optional("ENV").unwrap_or("development"));
        let log_level = parameters
            .get_optional("LOG_LEVEL")
            .and_then(logging::parse_level)
            .unwrap_or(Level::INFO);

        let server = ServerSettings {
            address: required(parameters, "SERVER_ADDRESS")?,
            port: parsed(parameters, "SERVER_PORT")?,
        };

        let database = DatabaseSettings {
            url: required(parameters, "DATABASE_URL")?,
            max_connections: parsed(parameters, "DB_MAX_CONNECTIONS")?,
            min_connections: parsed(parameters, "DB_MIN_CONNECTIONS")?,
            acquire_timeout_seconds: parsed(parameters, "DB_ACQUIRE_TIMEOUT_SECONDS")?,
            idle_timeout_seconds: parsed(parameters, "DB_IDLE_TIMEOUT_SECONDS")?,
            max_lifetime_seconds: parsed(parameters, "DB_MAX_LIFETIME_SECONDS")?,
        };

        let jwt = JwtSettings {
            access: token_settings(parameters, "JWT_ACCESS_SECRET", "JWT_ACCESS_EXPIRES_IN")?,
            refresh: token_settings(parameters, "JWT_REFRESH_SECRET", "JWT_REFRESH_EXPIRES_IN")?,
            verify_email: token_settings(
                parameters,
                "JWT_EMAIL_VERIFY_SECRET",
                "JWT_EMAIL_VERIFY_EXPIRES_IN",
            )?,
        };
        ensure_distinct(&jwt)?;

        let bcrypt_cost: u32 = parsed(parameters, "BCRYPT_COST")?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let username = required(parameters, "SMTP_USERNAME")?;
        let mail = MailSettings {
            host: required(parameters, "SMTP_HOST")?,
            port: parsed(parameters, "SMTP_PORT")?,
            password: required(parameters, "SMTP_PASSWORD")?,
            from: parameters
                .get_optional("MAIL_FROM")
                .map(str::to_string)
                .unwrap_or_else(|| username.clone()),
            username,
        };

        Ok(Self {
            environment,
            log_level,
            server,
            database,
            jwt,
            bcrypt_cost,
            client_url: required(parameters, "CLIENT_URL")?
                .trim_end_matches('/')
                .to_string(),
            mail,
            rate_limit_requests_per_minute: parsed(parameters, "RATE_LIMIT_REQUESTS_PER_MINUTE")?,
            refresh_token_cleanup_interval_minutes: parsed(
                parameters,
                "REFRESH_TOKEN_CLEANUP_INTERVAL_MINUTES",
            )?,
        })
    }

    pub fn is_development(&self) -> bool {
        cfg!(debug_assertions) || matches!(self.environment, Environment::Development)
    }
}

fn required(parameters: &Parameters, key: &'static str) -> Result<String, ConfigError> {
    parameters
        .get_optional(key)
        .map(str::to_string)
        .ok_or(ConfigError::Missing(key))
}

fn parsed<T: std::str::FromStr>(parameters: &Parameters, key: &'static str) -> Result<T, ConfigError> {
    let value = required(parameters, key)?;
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn token_settings(
    parameters: &Parameters,
    secret_key: &'static str,
    expires_key: &'static str,
) -> Result<TokenSettings, ConfigError> {
    let secret = required(parameters, secret_key)?;
    if secret.len() < MIN_SECRET_BYTES {
        return Err(ConfigError::WeakSecret {
            key: secret_key,
            length: secret.len(),
        });
    }

    let expires_in = required(parameters, expires_key)?;
    let ttl_seconds = parse_expiration_time(&expires_in)
        .filter(|seconds| *seconds <= MAX_TOKEN_TTL_SECONDS)
        .ok_or_else(|| ConfigError::Invalid {
            key: expires_key,
            value: expires_in.clone(),
        })?;

    Ok(TokenSettings {
        secret,
        expires_in,
        ttl_seconds,
    })
}

fn ensure_distinct(jwt: &JwtSettings) -> Result<(), ConfigError> {
    let pairs = [
        (&jwt.access, "JWT_ACCESS_SECRET", &jwt.refresh, "JWT_REFRESH_SECRET"),
        (&jwt.access, "JWT_ACCESS_SECRET", &jwt.verify_email, "JWT_EMAIL_VERIFY_SECRET"),
        (&jwt.refresh, "JWT_REFRESH_SECRET", &jwt.verify_email, "JWT_EMAIL_VERIFY_SECRET"),
    ];

    for (a, first, b, second) in pairs {
        if a.secret == b.secret {
            return Err(ConfigError::SharedSecret { first, second });
        }
    }
    Ok(())
}
