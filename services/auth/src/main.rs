use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auth::config::AuthConfig;
use auth::notify::LogNotifier;
use auth::oauth::GoogleVerifier;
use auth::rate_limiter::{RateLimiter, RateLimiterConfig};
use auth::repositories::PgUserDirectory;
use auth::routes::{self, AppState};
use auth::service::SessionService;
use auth::token::TokenCodec;
use auth::wrap::TokenWrapper;

use common::database::{self, DatabaseConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied");

    let config = AuthConfig::from_env()?;

    let wrapper = TokenWrapper::new(&config.wrapper_secret, &config.wrapper_salt);
    let codec = TokenCodec::new(&config.access_secret, &config.refresh_secret, wrapper);

    let verifier = GoogleVerifier::new(config.google_client_id.clone());
    let bind_address = config.bind_address.clone();

    let service = SessionService::new(
        PgUserDirectory::new(pool),
        codec,
        Arc::new(LogNotifier),
        RateLimiter::new(RateLimiterConfig::default()),
        config,
    );

    let app = routes::create_router(AppState { service, verifier });

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Authentication service listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
