//! Application state wiring the engine together.
//!
//! The engine is generic over its store and advisors; AppState pins it to the
//! SQLite checkpoint store and the HTTP advisor gateway.

use std::sync::Arc;

use anyhow::Context;
use arflow_core::pipeline::{BatchCoordinator, Engine};
use arflow_infra::advisor::HttpAdvisorClient;
use arflow_infra::config::{database_url, load_engine_config, resolve_data_dir};
use arflow_infra::sqlite::{DatabasePool, SqliteStateStore};

pub type ConcreteEngine = Engine<SqliteStateStore, HttpAdvisorClient>;

pub struct AppState {
    pub engine: Arc<ConcreteEngine>,
}

impl AppState {
    /// Load configuration, open the checkpoint database and build the engine.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let config = load_engine_config(&data_dir).await;
        let db_url = database_url(&config, &data_dir);
        let pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("failed to open checkpoint database at {db_url}"))?;

        let advisors = HttpAdvisorClient::new(&config.advisors)?;
        tracing::debug!(
            data_dir = %data_dir.display(),
            advisors = advisors.base_url(),
            "engine configured"
        );

        let engine = Engine::with_default_graph(SqliteStateStore::new(pool), advisors, config)?;

        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    pub fn batch_coordinator(&self) -> BatchCoordinator<SqliteStateStore, HttpAdvisorClient> {
        BatchCoordinator::new(Arc::clone(&self.engine))
    }
}
