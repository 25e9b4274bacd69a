use anyhow::Context;
use demo_core::Config;
use server::errors::AppError;
use std::sync::Arc;
use tracing::{error, info};
use vector_store::VectorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::init_tracing();

    info!("Starting embedding demo server");

    let config = Config::load_from_env().map_err(|e| AppError::Config(format!("{:#}", e)))?;
    info!("Using database {}", config.database.describe());

    // Schema problems are fatal: the app never serves against a half-initialized database.
    let store = match VectorStore::initialize(config.database.clone()).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize database schema: {:#}", e);
            return Err(e);
        }
    };
    info!("Schema ready with {:?} embedding column", store.variant());

    let app = server::create_app(Arc::new(store));

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;

    info!("Server running on http://{}", address);

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
