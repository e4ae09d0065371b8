use crate::config::database::{Database, DatabaseTrait};
use crate::config::logging::secure_log;
use crate::response::app_response::SuccessResponse;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub database: DatabaseHealth,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub status: String,
    pub response_time_ms: Option<u128>,
}

impl DatabaseHealth {
    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

pub fn init_start_time() {
    START_TIME.set(Instant::now()).ok();
}

pub fn get_uptime_seconds() -> u64 {
    START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

pub async fn health_check(State(db): State<Arc<Database>>) -> SuccessResponse<HealthStatus> {
    let database = check_database_health(&db).await;
    build_report(database)
}

fn build_report(database: DatabaseHealth) -> SuccessResponse<HealthStatus> {
    let (status, code) = if database.is_healthy() {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    SuccessResponse::send(HealthStatus {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_seconds: get_uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
    .with_status(code)
    .with_message(format!("Service is {}", status))
}

async fn check_database_health(db: &Database) -> DatabaseHealth {
    let start_time = Instant::now();

    match sqlx::query("SELECT 1").execute(db.get_pool()).await {
        Ok(_) => {
            let response_time = start_time.elapsed().as_millis();
            info!("Database health check passed in {}ms", response_time);
            DatabaseHealth {
                status: "healthy".to_string(),
                response_time_ms: Some(response_time),
            }
        }
        Err(e) => {
            secure_log::secure_error!("Database health check failed", e);
            DatabaseHealth {
                status: "unhealthy".to_string(),
                response_time_ms: None,
            }
        }
    }
}
