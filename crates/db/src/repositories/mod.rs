use async_trait::async_trait;
use thiserror::Error;

use outreach_core::domain::contact::SenderProfile;
use outreach_core::domain::research::ResearchResult;
use outreach_core::domain::session::{MemoryHit, SessionId, SessionMemory, Turn};
use outreach_core::errors::ApplicationError;

pub mod memory;
pub mod session;

pub use memory::InMemorySessionRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("session `{0}` not found")]
    NotFound(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

/// Durable storage for session memory records.
///
/// Each write method is a single atomic statement; a successful return means the write is
/// committed.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find(&self, id: &SessionId) -> Result<Option<SessionMemory>, RepositoryError>;

    /// Inserts an empty record unless one exists, then returns the stored record.
    async fn create_if_absent(&self, id: &SessionId) -> Result<SessionMemory, RepositoryError>;

    /// Replaces the research of a session, creating the session if needed.
    async fn save_research(
        &self,
        id: &SessionId,
        research: &ResearchResult,
    ) -> Result<(), RepositoryError>;

    /// Replaces the sender profile remembered for a session, creating the session if needed.
    async fn save_sender(
        &self,
        id: &SessionId,
        sender: &SenderProfile,
    ) -> Result<(), RepositoryError>;

    /// Appends a turn to an existing session and returns its 1-based turn number.
    async fn append_turn(&self, id: &SessionId, turn: &Turn) -> Result<u32, RepositoryError>;

    /// Session ids in creation order.
    async fn list_ids(&self) -> Result<Vec<SessionId>, RepositoryError>;

    /// Sessions whose research or turns mention `query`, in creation order.
    async fn search(&self, query: &str) -> Result<Vec<MemoryHit>, RepositoryError>;

    async fn close(&self) {}
}
