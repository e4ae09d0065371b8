use std::collections::HashMap;
use tracing::{info, warn};

/// Default configuration values
const DEFAULTS: &[(&str, &str)] = &[
    ("ENV", "development"),
    ("LOG_LEVEL", "info"),
    ("SERVER_ADDRESS", "127.0.0.1"),
    ("SERVER_PORT", "5000"),
    ("DB_MAX_CONNECTIONS", "20"),
    ("DB_MIN_CONNECTIONS", "5"),
    ("DB_ACQUIRE_TIMEOUT_SECONDS", "30"),
    ("DB_IDLE_TIMEOUT_SECONDS", "600"), // 10 minutes
    ("DB_MAX_LIFETIME_SECONDS", "1800"), // 30 minutes
    ("BCRYPT_COST", "10"),
    ("JWT_ACCESS_EXPIRES_IN", "1d"),
    ("JWT_REFRESH_EXPIRES_IN", "30d"),
    ("JWT_EMAIL_VERIFY_EXPIRES_IN", "24h"),
    ("CLIENT_URL", "http://localhost:3000"),
    ("SMTP_HOST", "smtp.gmail.com"),
    ("SMTP_PORT", "465"),
    ("RATE_LIMIT_REQUESTS_PER_MINUTE", "60"),
    ("REFRESH_TOKEN_CLEANUP_INTERVAL_MINUTES", "60"),
];

/// Keys without a default; `Settings` decides which of them are mandatory
const EXTERNAL_KEYS: &[&str] = &[
    "DATABASE_URL",
    "JWT_ACCESS_SECRET",
    "JWT_REFRESH_SECRET",
    "JWT_EMAIL_VERIFY_SECRET",
    "SMTP_USERNAME",
    "SMTP_PASSWORD",
    "MAIL_FROM",
];

/// Raw key/value configuration, read once at startup.
#[derive(Clone, Debug, Default)]
pub struct Parameters {
    values: HashMap<String, String>,
}

impl Parameters {
    /// Load defaults, then `.env`, then the process environment.
    pub fn load() -> Self {
        match dotenv::dotenv() {
            Ok(path) => info!("Loaded environment file: {:?}", path),
            Err(_) => warn!("No .env file found, using system environment variables"),
        }

        let mut parameters = Self::with_defaults();

        let keys = DEFAULTS
            .iter()
            .map(|(key, _)| *key)
            .chain(EXTERNAL_KEYS.iter().copied());
        for key in keys {
            if let Ok(value) = std::env::var(key) {
                parameters.values.insert(key.to_string(), value);
            }
        }

        info!("Configuration parameters loaded: {} keys", parameters.values.len());
        parameters
    }

    pub fn with_defaults() -> Self {
        let values = DEFAULTS
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self { values }
    }

    /// Defaults overridden by the given pairs, without touching the environment.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut parameters = Self::with_defaults();
        for (key, value) in pairs {
            parameters.values.insert(key.to_string(), value.to_string());
        }
        parameters
    }

    pub fn get_optional(&self, parameter: &str) -> Option<&str> {
        self.values
            .get(parameter)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}
