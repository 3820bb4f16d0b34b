use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use outreach_core::domain::contact::SenderProfile;
use outreach_core::domain::research::ResearchResult;
use outreach_core::domain::session::{MemoryHit, SessionId, SessionMemory, Turn};

use super::{RepositoryError, SessionRepository};

#[derive(Default)]
struct Sessions {
    records: HashMap<SessionId, SessionMemory>,
    creation_order: Vec<SessionId>,
}

impl Sessions {
    fn ensure(&mut self, id: &SessionId) -> &mut SessionMemory {
        if !self.records.contains_key(id) {
            self.creation_order.push(id.clone());
        }
        self.records
            .entry(id.clone())
            .or_insert_with(|| SessionMemory::empty(id.clone(), Utc::now()))
    }
}

/// Process-local repository for tests and ephemeral runs; nothing survives a restart.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<Sessions>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find(&self, id: &SessionId) -> Result<Option<SessionMemory>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.records.get(id).cloned())
    }

    async fn create_if_absent(&self, id: &SessionId) -> Result<SessionMemory, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.ensure(id).clone())
    }

    async fn save_research(
        &self,
        id: &SessionId,
        research: &ResearchResult,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.ensure(id).research = Some(research.clone());
        Ok(())
    }

    async fn save_sender(
        &self,
        id: &SessionId,
        sender: &SenderProfile,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.ensure(id).sender = Some(sender.clone());
        Ok(())
    }

    async fn append_turn(&self, id: &SessionId, turn: &Turn) -> Result<u32, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let record =
            sessions.records.get_mut(id).ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        record.turn_history.push(turn.clone());
        u32::try_from(record.turn_history.len())
            .map_err(|error| RepositoryError::Decode(error.to_string()))
    }

    async fn list_ids(&self) -> Result<Vec<SessionId>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.creation_order.clone())
    }

    async fn search(&self, query: &str) -> Result<Vec<MemoryHit>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .creation_order
            .iter()
            .filter_map(|id| sessions.records.get(id))
            .filter_map(|memory| {
                memory
                    .excerpt_matching(query)
                    .map(|excerpt| MemoryHit { session_id: memory.session_id.clone(), excerpt })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use outreach_core::domain::contact::SenderProfile;
    use outreach_core::domain::research::ResearchResult;
    use outreach_core::domain::session::{SessionId, Turn};

    use crate::repositories::{InMemorySessionRepository, RepositoryError, SessionRepository};

    #[tokio::test]
    async fn in_memory_repository_matches_sql_contract() {
        let repo = InMemorySessionRepository::default();
        let id = SessionId::for_lead("Jane");

        let created = repo.create_if_absent(&id).await.expect("create");
        assert!(created.research.is_none());
        assert_eq!(repo.create_if_absent(&id).await.expect("create again"), created);

        let research =
            ResearchResult::new("Jane", "Leads platform work.", BTreeMap::new()).expect("research");
        repo.save_research(&id, &research).await.expect("save");
        let turn = Turn { question: "Role?".to_owned(), answer: "Platform lead".to_owned() };
        assert_eq!(repo.append_turn(&id, &turn).await.expect("append"), 1);

        let stored = repo.find(&id).await.expect("find").expect("exists");
        assert_eq!(stored.research, Some(research));
        assert_eq!(stored.turn_history, vec![turn]);
        assert_eq!(repo.list_ids().await.expect("list"), vec![id]);
    }

    #[tokio::test]
    async fn append_to_unknown_session_is_not_found() {
        let repo = InMemorySessionRepository::default();
        let error = repo
            .append_turn(
                &SessionId::parse("ghost").expect("valid id"),
                &Turn { question: "q".to_owned(), answer: "a".to_owned() },
            )
            .await
            .expect_err("unknown session");
        assert!(matches!(error, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn search_and_sender_follow_the_sql_contract() {
        let repo = InMemorySessionRepository::default();
        let jane = SessionId::for_lead("Jane");
        let omar = SessionId::for_lead("Omar");
        let turn = |answer: &str| Turn { question: "Focus?".to_owned(), answer: answer.to_owned() };
        repo.create_if_absent(&jane).await.expect("create");
        repo.append_turn(&jane, &turn("Hiring data engineers")).await.expect("append");
        repo.create_if_absent(&omar).await.expect("create");
        repo.append_turn(&omar, &turn("Data platform migration")).await.expect("append");

        let hits = repo.search("DATA").await.expect("search");
        let ids: Vec<&str> = hits.iter().map(|hit| hit.session_id.as_str()).collect();
        assert_eq!(ids, ["lead:jane", "lead:omar"]);
        assert_eq!(hits[1].excerpt, "Data platform migration");
        assert!(repo.search("robotics").await.expect("search").is_empty());

        let sender = SenderProfile {
            name: Some("Sam".to_owned()),
            career_field: "Data".to_owned(),
            career_description: "Analytics engineer".to_owned(),
        };
        repo.save_sender(&omar, &sender).await.expect("save sender");
        let stored = repo.find(&omar).await.expect("find").expect("exists");
        assert_eq!(stored.sender, Some(sender));
        assert_eq!(stored.turn_history.len(), 1);
    }
}
