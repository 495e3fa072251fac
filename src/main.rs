use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use physihome_core::{AdminRoster, config_from_env_values, mailer_from_env_values};
use physihome_store::open_store;

/// Main entry point for the PhysiHome portal
///
/// Opens the store, reconciles the configured admin accounts and serves the REST API
/// (with Swagger UI at `/swagger-ui`).
///
/// # Environment Variables
/// - `PHYSIHOME_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `DATABASE_URL`: SQLite URL; without it an in-memory store is used
/// - `SECRET_KEY`: session, OTP and message key material (required in production)
/// - `ADMIN_EMAILS`: comma-separated admin addresses
/// - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_USE_TLS`: outgoing mail
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, storage or server startup fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("physihome_run=info".parse()?)
                .add_directive("physihome_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let env = |name: &str| std::env::var(name).ok();
    let cfg = Arc::new(config_from_env_values(env)?);
    let store = open_store(env("DATABASE_URL").as_deref()).await?;
    let mailer = mailer_from_env_values(env, cfg.notify_from_email())?;

    let admins = AdminRoster::new(cfg.clone(), store.clone())
        .admin_identities()
        .await?;
    tracing::info!("++ {} admin account(s) ready", admins.len());

    let rest_addr = env("PHYSIHOME_REST_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into());
    tracing::info!("++ Starting PhysiHome REST on {}", rest_addr);

    let app = router(AppState::new(cfg, store, mailer));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
