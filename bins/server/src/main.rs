//! Kinko API server.
//!
//! Serves the ledger, chip, loan, tax and collections routes.

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kinko_api::{AppState, create_router};
use kinko_db::{AccountRepository, LedgerSettings, connect};
use kinko_shared::{AppConfig, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kinko=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    let db = connect(&config.database).await?;
    info!("Connected to database");

    let settings = LedgerSettings::from_config(&config)?;
    let system_accounts = AccountRepository::new(db.clone(), settings)
        .ensure_system_accounts()
        .await?;
    info!(count = system_accounts.len(), "System accounts ready");

    let jwt_service = JwtService::new(JwtConfig::from(&config.jwt));
    let state = AppState::new(db, &config, jwt_service)?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
