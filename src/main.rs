use std::net::TcpListener;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use videotube::auth::{PasswordHasher, TokenService};
use videotube::configuration::{get_configuration, Settings, StorageBackend};
use videotube::cookies::SessionCookies;
use videotube::media::{HttpMediaStore, MediaStore};
use videotube::session::SessionManager;
use videotube::startup::run;
use videotube::store::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};
use videotube::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, message: &str) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

async fn build_store(configuration: &Settings) -> std::io::Result<Arc<dyn CredentialStore>> {
    match configuration.application.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory credential store; accounts are lost on restart");
            Ok(Arc::new(InMemoryCredentialStore::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&configuration.database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    startup_error(std::io::ErrorKind::ConnectionRefused, "Database connection error")
                })?;

            sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
                tracing::error!("Failed to run database migrations: {}", e);
                startup_error(std::io::ErrorKind::Other, "Database migration error")
            })?;

            tracing::info!("Database connection pool created successfully");
            Ok(Arc::new(PgCredentialStore::new(pool)))
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(startup_error(std::io::ErrorKind::InvalidInput, "Configuration error"));
        }
    };

    if let Err(e) = configuration.jwt.validate() {
        tracing::error!("Invalid JWT configuration: {}", e);
        return Err(startup_error(std::io::ErrorKind::InvalidInput, "Configuration error"));
    }

    let store = build_store(&configuration).await?;

    let media: Arc<dyn MediaStore> = match HttpMediaStore::from_settings(&configuration.media) {
        Ok(media) => Arc::new(media),
        Err(e) => {
            tracing::error!("Failed to build media client: {}", e);
            return Err(startup_error(std::io::ErrorKind::Other, "Media client error"));
        }
    };

    let cookies = SessionCookies::new(
        configuration.application.secure_cookies,
        configuration.jwt.access_token_expiry,
        configuration.jwt.refresh_token_expiry,
    );
    let sessions = SessionManager::new(
        store,
        TokenService::new(configuration.jwt.clone()),
        PasswordHasher::new(configuration.password.bcrypt_cost),
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, sessions, media, cookies)?.await
}
