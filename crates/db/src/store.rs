//! Session Memory Store: one research result plus an append-only question/answer history per
//! session key, persisted through a [`SessionRepository`].
//!
//! Operations on the same key are serialized by a per-key async mutex; different keys never
//! wait on each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use outreach_core::domain::contact::SenderProfile;
use outreach_core::domain::research::ResearchResult;
use outreach_core::domain::session::{MemoryHit, SessionId, SessionMemory, Turn};
use outreach_core::errors::{ApplicationError, DomainError};
use outreach_core::ports::Reasoner;

use crate::repositories::SessionRepository;

pub struct SessionMemoryStore {
    repository: Arc<dyn SessionRepository>,
    reasoner: Arc<dyn Reasoner>,
    key_locks: Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
    closed: AtomicBool,
}

impl SessionMemoryStore {
    pub fn new(repository: Arc<dyn SessionRepository>, reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            repository,
            reasoner,
            key_locks: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn get_or_create(&self, id: &SessionId) -> Result<SessionMemory, ApplicationError> {
        self.ensure_open()?;
        let lock = self.key_lock(id);
        let _guard = lock.lock().await;

        let memory = self.repository.create_if_absent(id).await?;
        debug!(
            event_name = "memory.session_resolved",
            session_id = %id,
            turns = memory.turn_history.len(),
            "session memory resolved"
        );
        Ok(memory)
    }

    /// Replaces the session's research in one atomic write.
    pub async fn store_research(
        &self,
        id: &SessionId,
        research: ResearchResult,
    ) -> Result<(), ApplicationError> {
        self.ensure_open()?;
        let lock = self.key_lock(id);
        let _guard = lock.lock().await;

        self.repository.save_research(id, &research).await?;
        info!(
            event_name = "memory.research_stored",
            session_id = %id,
            subject_name = research.subject_name(),
            fields = research.structured_fields().len(),
            "research stored"
        );
        Ok(())
    }

    /// Remembers who is writing to this lead, replacing any earlier profile.
    pub async fn remember_sender(
        &self,
        id: &SessionId,
        sender: &SenderProfile,
    ) -> Result<(), ApplicationError> {
        self.ensure_open()?;
        let lock = self.key_lock(id);
        let _guard = lock.lock().await;

        self.repository.save_sender(id, sender).await?;
        info!(event_name = "memory.sender_stored", session_id = %id, "sender profile stored");
        Ok(())
    }

    pub async fn sender(&self, id: &SessionId) -> Result<Option<SenderProfile>, ApplicationError> {
        self.ensure_open()?;
        Ok(self.repository.find(id).await?.and_then(|memory| memory.sender))
    }

    pub async fn answer_question(
        &self,
        id: &SessionId,
        question: &str,
    ) -> Result<String, ApplicationError> {
        self.ensure_open()?;
        let question = question.trim();
        if question.is_empty() {
            return Err(DomainError::InvalidField {
                field: "question".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        let lock = self.key_lock(id);
        let _guard = lock.lock().await;

        let memory = self.repository.find(id).await?;
        let Some((research, history)) = memory
            .and_then(|memory| memory.research.map(|research| (research, memory.turn_history)))
        else {
            return Err(DomainError::NoResearch { session_id: id.to_string() }.into());
        };

        let answer = self.reasoner.answer(&research, &history, question).await?;
        let turn = Turn { question: question.to_owned(), answer };
        let turn_number = self.repository.append_turn(id, &turn).await?;

        info!(
            event_name = "memory.turn_appended",
            session_id = %id,
            turn_number,
            "question answered"
        );
        Ok(turn.answer)
    }

    /// Read-only snapshot; `None` when the session was never created.
    pub async fn inspect(&self, id: &SessionId) -> Result<Option<SessionMemory>, ApplicationError> {
        self.ensure_open()?;
        Ok(self.repository.find(id).await?)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionId>, ApplicationError> {
        self.ensure_open()?;
        Ok(self.repository.list_ids().await?)
    }

    /// Sessions whose research or conversation mention `query`, with a short excerpt each.
    pub async fn search(&self, query: &str) -> Result<Vec<MemoryHit>, ApplicationError> {
        self.ensure_open()?;
        let query = query.trim();
        if query.is_empty() {
            return Err(DomainError::InvalidField {
                field: "query".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        let hits = self.repository.search(query).await?;
        debug!(event_name = "memory.searched", hits = hits.len(), "memory searched");
        Ok(hits)
    }

    /// Stops accepting operations and releases the underlying storage.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.repository.close().await;
        info!(event_name = "memory.store_closed", "session memory store closed");
    }

    fn ensure_open(&self) -> Result<(), ApplicationError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ApplicationError::Persistence("session memory store is closed".to_owned()));
        }
        Ok(())
    }

    fn key_lock(&self, id: &SessionId) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.key_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(id.clone()).or_default())
    }
}
