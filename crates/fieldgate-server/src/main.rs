use anyhow::{Context, Result};
use fieldgate_core::{builtin_messages, MessageCatalog, MessageResolver};
use fieldgate_runtime::{ExternalLookup, FieldValidationService};
use fieldgate_server::{demo, router, AppState, Config, SqlLookup};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load_default()
        .unwrap_or_else(|e| {
            warn!("Failed to load config: {:#}, using defaults", e);
            Config::default()
        })
        .with_env_overrides();

    let messages: Arc<dyn MessageResolver> = match &config.messages.path {
        Some(path) => Arc::new(MessageCatalog::load(path)?),
        None => builtin_messages(),
    };

    let lookup: Arc<dyn ExternalLookup> = match &config.database.url {
        Some(url) => {
            let lookup = SqlLookup::connect(url)
                .await
                .with_context(|| format!("Failed to open lookup database {}", url))?;
            info!(database = %url, "uniqueness lookups backed by sqlite");
            Arc::new(lookup)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory lookups");
            Arc::new(demo::demo_lookup())
        }
    };

    let service = Arc::new(
        FieldValidationService::new(config.runtime.clone(), demo::registration_rules(), lookup)
            .with_messages(messages),
    );
    let sweeper = service.spawn_sweeper();

    let app = router(AppState::new(service));

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
    }
}
