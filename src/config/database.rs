use crate::config::settings::Settings;
use async_trait::async_trait;
use sqlx::{Error, Pool, Postgres, pool::PoolOptions};
use std::time::Duration;
use tracing::info;

pub struct Database {
    pool: Pool<Postgres>,
}

#[async_trait]
pub trait DatabaseTrait {
    async fn init(settings: &Settings) -> Result<Self, Error>
        where
            Self: Sized;
    async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError>;
    fn get_pool(&self) -> &Pool<Postgres>;
}

#[async_trait]
impl DatabaseTrait for Database {
    async fn init(settings: &Settings) -> Result<Self, Error> {
        let config = &settings.database;

        let pool = PoolOptions::<Postgres>::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
            .connect(&config.url)
            .await?;

        // Pool capacity is only worth logging outside production
        if settings.is_development() {
            info!(
                "Database pool configured: max={}, min={}, acquire_timeout={}s, idle_timeout={}s, max_lifetime={}s",
                config.max_connections,
                config.min_connections,
                config.acquire_timeout_seconds,
                config.idle_timeout_seconds,
                config.max_lifetime_seconds
            );
        } else {
            info!("Database pool configured successfully");
        }

        Ok(Self { pool })
    }

    async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    fn get_pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}
