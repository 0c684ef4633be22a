use quill_orm::Database;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod database;
mod models;

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Orm(#[from] quill_orm::Error),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Console logging; `RUST_LOG` overrides the default `info` filter
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    init_tracing();

    let config = config::AppConfig::load()?;
    let database = Database::connect(&config.database).await?;

    // Create tables and register entities before serving
    database::setup(&database, config.database.driver).await?;

    let app = api::create_router(database.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.server.bind.clone(),
            source,
        })?;

    info!(address = %config.server.bind, "server running");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    database.close().await;
    info!("connection pool closed");
    served.map_err(StartupError::Serve)
}
