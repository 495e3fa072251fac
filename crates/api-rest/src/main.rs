//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Handy during development when only the HTTP surface (with OpenAPI/Swagger UI) is needed. The
//! workspace's `physihome-run` binary is the normal entry point and serves the same router.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use physihome_core::{config_from_env_values, mailer_from_env_values};
use physihome_store::open_store;

/// Starts the REST server on `PHYSIHOME_REST_ADDR` (default: 0.0.0.0:3000).
///
/// # Errors
/// Returns an error if:
/// - the configuration in the environment is invalid,
/// - the store cannot be opened or migrated,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let env = |name: &str| std::env::var(name).ok();
    let cfg = Arc::new(config_from_env_values(env)?);
    let store = open_store(env("DATABASE_URL").as_deref()).await?;
    let mailer = mailer_from_env_values(env, cfg.notify_from_email())?;

    let addr = env("PHYSIHOME_REST_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into());
    tracing::info!("-- Starting PhysiHome REST API on {}", addr);

    let app = router(AppState::new(cfg, store, mailer));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
