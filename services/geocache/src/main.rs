use std::sync::Arc;

use anyhow::Result;
use common::database::{DatabaseConfig, health_check, init_pool};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use geocache::{
    config::{AppConfig, StorageBackend},
    repositories::{GeocacheRepository, MemoryRepository, PgRepository},
    routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting geocache service");

    let repository: Arc<dyn GeocacheRepository> = match config.storage {
        StorageBackend::Postgres => {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            let repository = PgRepository::new(pool);
            repository.ensure_schema().await?;
            Arc::new(repository)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage, data will not survive a restart");
            Arc::new(MemoryRepository::new())
        }
    };

    let app = routes::create_router(AppState::new(repository));

    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Geocache service listening on {}", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
