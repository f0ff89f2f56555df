use std::sync::Arc;

use anyhow::Context;
use tracing::warn;

use crate::{
    config::{AppConfig, StorageBackend},
    db,
    foods::{FoodCatalog, MemoryCatalog, PgCatalog},
    ledger::{memory::MemoryLedger, repo::PgLedger, Ledger},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub ledger: Arc<dyn Ledger>,
    pub catalog: Arc<dyn FoodCatalog>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        Self::from_config(AppConfig::from_env()?).await
    }

    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        match config.storage {
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for postgres storage")?;
                let pool = db::connect(url, config.db_max_connections).await?;
                db::migrate(&pool).await?;
                let ledger = Arc::new(PgLedger::new(pool.clone())) as Arc<dyn Ledger>;
                let catalog = Arc::new(PgCatalog::new(pool)) as Arc<dyn FoodCatalog>;
                Ok(Self::from_parts(config, ledger, catalog))
            }
            StorageBackend::Memory => {
                warn!("using in-memory storage; nothing survives a restart");
                Ok(Self::from_parts(
                    config,
                    Arc::new(MemoryLedger::new()),
                    Arc::new(MemoryCatalog::new()),
                ))
            }
        }
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        ledger: Arc<dyn Ledger>,
        catalog: Arc<dyn FoodCatalog>,
    ) -> Self {
        Self {
            config,
            ledger,
            catalog,
        }
    }

    /// In-memory state for tests.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            storage: StorageBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
        });
        Self::from_parts(
            config,
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryCatalog::new()),
        )
    }
}
