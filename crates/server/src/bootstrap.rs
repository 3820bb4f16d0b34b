use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use outreach_agent::prompts::PromptLibrary;
use outreach_agent::{build_client, LlmReasoner, LlmResearcher};
use outreach_core::config::{AppConfig, ConfigError};
use outreach_core::errors::ApplicationError;
use outreach_core::ports::Researcher;
use outreach_db::{
    connect_with_settings, migrations, DbPool, SessionMemoryStore, SqlSessionRepository,
};
use thiserror::Error;
use tracing::info;

use crate::api::{self, ApiState};
use crate::health::{health, HealthState};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: Arc<SessionMemoryStore>,
    pub researcher: Arc<dyn Researcher>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot open session database: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("cannot migrate session database: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("model client setup failed: {0}")]
    LlmClient(#[source] ApplicationError),
    #[error("prompt templates failed to load: {0}")]
    Prompts(String),
}

impl Application {
    pub fn router(&self) -> Router {
        let health_routes = Router::new()
            .route("/health", get(health))
            .with_state(HealthState { db_pool: self.db_pool.clone() });

        api::router(ApiState { store: self.store.clone(), researcher: self.researcher.clone() })
            .merge(health_routes)
    }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db = &config.database;
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        llm_model = %config.llm.model,
        "wiring outreach services"
    );

    let db_pool = connect_with_settings(&db.url, db.max_connections, db.timeout_secs)
        .await
        .map_err(BootstrapError::DatabaseConnect)?;
    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.database_ready",
        correlation_id = "bootstrap",
        max_connections = db.max_connections,
        "session database open and migrated"
    );

    let llm = build_client(&config.llm).map_err(BootstrapError::LlmClient)?;
    let prompts =
        Arc::new(PromptLibrary::new().map_err(|error| BootstrapError::Prompts(error.to_string()))?);
    let store = SessionMemoryStore::new(
        Arc::new(SqlSessionRepository::new(db_pool.clone())),
        Arc::new(LlmReasoner::new(llm.clone(), prompts.clone())),
    );

    Ok(Application {
        config,
        db_pool,
        store: Arc::new(store),
        researcher: Arc::new(LlmResearcher::new(llm, prompts)),
    })
}
