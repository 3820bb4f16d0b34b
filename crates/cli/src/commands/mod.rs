pub mod ask;
pub mod config;
pub mod doctor;
pub mod inspect;
pub mod migrate;
pub mod outreach;
pub mod research;
pub mod search;
pub mod sessions;

use std::sync::Arc;

use outreach_agent::prompts::PromptLibrary;
use outreach_agent::{build_client, LlmClient, LlmReasoner};
use outreach_core::config::{AppConfig, LoadOptions};
use outreach_core::errors::{ApplicationError, ErrorKind};
use outreach_db::{connect_with_settings, migrations, SessionMemoryStore, SqlSessionRepository};
use serde::Serialize;
use serde_json::Value;

/// Exit code plus the single JSON line a command prints.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Ok,
    Error,
}

#[derive(Serialize)]
struct Envelope<'a> {
    command: &'a str,
    status: Status,
    error_class: Option<&'a str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl Envelope<'_> {
    fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            serde_json::json!({
                "command": self.command,
                "status": "error",
                "error_class": "serialization",
                "message": error.to_string(),
            })
            .to_string()
        })
    }
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, message, None)
    }

    pub fn success_with(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let envelope = Envelope {
            command,
            status: Status::Ok,
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: envelope.render() }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let envelope = Envelope {
            command,
            status: Status::Error,
            error_class: Some(error_class),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: envelope.render() }
    }

    /// Maps an application failure onto its stable error class and exit code.
    pub fn from_application_error(command: &str, error: &ApplicationError) -> Self {
        let kind = error.kind();
        let exit_code = match kind {
            ErrorKind::Configuration => 2,
            ErrorKind::Persistence => 4,
            ErrorKind::ResearchUnavailable | ErrorKind::Generation | ErrorKind::Delivery => 6,
            ErrorKind::NoResearch | ErrorKind::InvalidState | ErrorKind::InvalidInput => 7,
        };
        Self::failure(command, kind.as_str(), error.to_string(), exit_code)
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default())
        .map_err(|error| CommandResult::failure(command, "config_validation", error.to_string(), 2))
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| CommandResult::failure(command, "runtime_init", error.to_string(), 3))
}

/// Model client and prompt templates shared by the agent-backed commands.
pub(crate) struct Agents {
    pub llm: Arc<dyn LlmClient>,
    pub prompts: Arc<PromptLibrary>,
}

pub(crate) fn build_agents(command: &str, config: &AppConfig) -> Result<Agents, CommandResult> {
    let llm = build_client(&config.llm)
        .map_err(|error| CommandResult::from_application_error(command, &error))?;
    let prompts = PromptLibrary::new().map_err(|error| {
        CommandResult::failure(command, "configuration", format!("prompt templates: {error}"), 2)
    })?;
    Ok(Agents { llm, prompts: Arc::new(prompts) })
}

/// Connects, applies pending migrations and wraps the pool in a memory store.
pub(crate) async fn open_store(
    command: &str,
    config: &AppConfig,
    agents: &Agents,
) -> Result<SessionMemoryStore, CommandResult> {
    let db = &config.database;
    let pool = connect_with_settings(&db.url, db.max_connections, db.timeout_secs)
        .await
        .map_err(|error| CommandResult::failure(command, "db_connectivity", error.to_string(), 4))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| CommandResult::failure(command, "migration", error.to_string(), 5))?;

    Ok(SessionMemoryStore::new(
        Arc::new(SqlSessionRepository::new(pool)),
        Arc::new(LlmReasoner::new(agents.llm.clone(), agents.prompts.clone())),
    ))
}

/// Runs a store-backed command on a fresh single-threaded runtime, closing the store after.
pub(crate) fn with_store<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(AppConfig, Agents, SessionMemoryStore) -> Fut,
    Fut: std::future::Future<Output = (SessionMemoryStore, CommandResult)>,
{
    let config = match load_config(command) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let agents = match build_agents(command, &config) {
        Ok(agents) => agents,
        Err(result) => return result,
    };
    let runtime = match build_runtime(command) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async move {
        let store = match open_store(command, &config, &agents).await {
            Ok(store) => store,
            Err(result) => return result,
        };
        let (store, result) = body(config, agents, store).await;
        store.close().await;
        result
    })
}
