pub mod app_config;
pub mod database;
pub mod memory;
pub mod pg_repo;

use berth_core::repository::TicketStore;
use std::sync::Arc;
use tracing::info;

pub use app_config::{Config, StoreBackend};
pub use database::DbClient;
pub use memory::InMemoryTicketStore;
pub use pg_repo::PgTicketStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreSetupError {
    #[error("postgres backend selected but no [database] section configured")]
    MissingDatabase,
    #[error(transparent)]
    Connect(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Builds the configured backend. The berth pool is not seeded here; call
/// `TicketStore::initialize_pool` once the store is up.
pub async fn connect(config: &Config) -> Result<Arc<dyn TicketStore>, StoreSetupError> {
    let lock_timeout = config.store.lock_timeout();
    let store: Arc<dyn TicketStore> = match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory ticket store");
            Arc::new(InMemoryTicketStore::new(lock_timeout))
        }
        StoreBackend::Postgres => {
            let db_config = config.database.as_ref().ok_or(StoreSetupError::MissingDatabase)?;
            let db = DbClient::new(db_config, lock_timeout).await?;
            db.migrate().await?;
            info!("Using postgres ticket store");
            Arc::new(PgTicketStore::new(db.pool, lock_timeout))
        }
    };

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_leaves_pool_unseeded() {
        let config = Config::default();
        let store = connect(&config).await.unwrap();
        assert!(store.list_berths(None).await.unwrap().is_empty());

        assert_eq!(store.initialize_pool(&config.pool).await.unwrap(), 81);
        assert_eq!(store.initialize_pool(&config.pool).await.unwrap(), 0);
    }
}
