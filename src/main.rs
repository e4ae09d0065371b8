use std::sync::Arc;
use storefront_auth::config::database::{Database, DatabaseTrait};
use storefront_auth::config::logging;
use storefront_auth::config::parameter::Parameters;
use storefront_auth::config::settings::Settings;
use storefront_auth::handler::health_handler;
use storefront_auth::repository::refresh_token_repository::{RefreshTokenRepository, RefreshTokenRepositoryTrait};
use storefront_auth::repository::user_repository::UserRepository;
use storefront_auth::routes;
use storefront_auth::service::auth_service::AuthService;
use storefront_auth::service::mail_service::{MailDispatcher, SmtpMailSender};
use storefront_auth::service::refresh_token_service::start_cleanup_task;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG wins over LOG_LEVEL when both are set
    let parameters = Parameters::load();
    let default_filter = parameters.get_optional("LOG_LEVEL").unwrap_or("info").to_lowercase();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    info!("Starting storefront auth service...");

    let settings = match Settings::from_parameters(&parameters) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    info!("Configuration loaded: {} parameters", parameters.len());

    logging::init(settings.environment, settings.log_level);
    health_handler::init_start_time();

    let connection = match Database::init(&settings).await {
        Ok(conn) => {
            info!("Database connection established successfully");
            Arc::new(conn)
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = connection.migrate().await {
        error!("Failed to apply database migrations: {}", e);
        return Err(e.into());
    }

    let shutdown_token = CancellationToken::new();

    let mail_sender = match SmtpMailSender::new(&settings.mail) {
        Ok(sender) => Arc::new(sender),
        Err(e) => {
            error!("Failed to configure SMTP transport: {}", e);
            return Err(e.into());
        }
    };
    let (mailer, mail_worker) = MailDispatcher::start(mail_sender, shutdown_token.clone());
    info!("Mail worker started for relay {}:{}", settings.mail.host, settings.mail.port);

    let refresh_tokens: Arc<dyn RefreshTokenRepositoryTrait> = Arc::new(RefreshTokenRepository::new(&connection));
    let cleanup_task_handle = start_cleanup_task(
        refresh_tokens.clone(),
        settings.refresh_token_cleanup_interval_minutes,
        shutdown_token.clone(),
    );
    info!(
        "Refresh token cleanup task started, interval: {} minutes",
        settings.refresh_token_cleanup_interval_minutes
    );

    let auth_service = Arc::new(AuthService::new(
        Arc::new(UserRepository::new(&connection)),
        refresh_tokens,
        &settings,
        mailer,
    ));

    let app = match routes::root::routes(connection.clone(), auth_service, &settings) {
        Ok(router) => router,
        Err(e) => {
            error!("Failed to initialize routes: {}", e);
            return Err(e.into());
        }
    };

    let host = settings.server.bind_address();
    let listener = match tokio::net::TcpListener::bind(&host).await {
        Ok(listener) => {
            info!("Server successfully bound to {}", host);
            listener
        }
        Err(e) => {
            error!("Failed to bind to {}: {}", host, e);
            return Err(e.into());
        }
    };

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal, initiating graceful shutdown...");
                signal_token.cancel();
            }
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
            }
        }
    });

    let server_token = shutdown_token.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await;

    // Background tasks finish after the listener stops accepting requests
    shutdown_token.cancel();
    if let Err(e) = cleanup_task_handle.await {
        error!("Error waiting for cleanup task to finish: {}", e);
    }
    if let Err(e) = mail_worker.await {
        error!("Error waiting for mail worker to finish: {}", e);
    }

    match served {
        Ok(()) => {
            info!("Server shutdown gracefully");
            Ok(())
        }
        Err(e) => {
            error!("Server error: {}", e);
            Err(e.into())
        }
    }
}
