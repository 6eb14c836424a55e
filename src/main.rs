use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use recsys_api::api::{create_router, AppState};
use recsys_api::config::Config;
use recsys_api::store::{create_pool, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(pool));
    let state = AppState::new(store);

    if config.train_on_startup {
        // Initial build runs in the background; the engine serves the
        // popularity fallback until the first snapshot lands.
        let engine = state.engine.clone();
        tokio::spawn(async move {
            engine.initialize().await;
        });
    }

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("recommendation service listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
