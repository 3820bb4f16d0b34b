use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use outreach_core::domain::contact::SenderProfile;
use outreach_core::domain::research::{FieldValue, ResearchResult};
use outreach_core::domain::session::{MemoryHit, SessionId, SessionMemory, Turn};

use super::{RepositoryError, SessionRepository};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn decode_err(error: impl ToString) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(decode_err)
}

fn row_to_research(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Option<ResearchResult>, RepositoryError> {
    let updated_at: Option<String> = row.try_get("research_updated_at").map_err(decode_err)?;
    if updated_at.is_none() {
        return Ok(None);
    }

    let subject_name: Option<String> = row.try_get("subject_name").map_err(decode_err)?;
    let narrative: Option<String> = row.try_get("narrative").map_err(decode_err)?;
    let fields_json: Option<String> = row.try_get("structured_fields").map_err(decode_err)?;

    let structured_fields: BTreeMap<String, FieldValue> = match fields_json {
        Some(raw) => serde_json::from_str(&raw).map_err(decode_err)?,
        None => BTreeMap::new(),
    };

    ResearchResult::new(
        subject_name.unwrap_or_default(),
        narrative.unwrap_or_default(),
        structured_fields,
    )
    .map(Some)
    .map_err(decode_err)
}

fn row_to_sender(row: &sqlx::sqlite::SqliteRow) -> Result<Option<SenderProfile>, RepositoryError> {
    let raw: Option<String> = row.try_get("sender_profile").map_err(decode_err)?;
    raw.map(|raw| serde_json::from_str(&raw).map_err(decode_err)).transpose()
}

fn row_to_id(row: &sqlx::sqlite::SqliteRow) -> Result<SessionId, RepositoryError> {
    let raw: String = row.try_get("session_id").map_err(decode_err)?;
    SessionId::parse(&raw).map_err(decode_err)
}

/// `%query%` with LIKE wildcards escaped by `\`.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, RepositoryError> {
    let question: String = row.try_get("question").map_err(decode_err)?;
    let answer: String = row.try_get("answer").map_err(decode_err)?;
    Ok(Turn { question, answer })
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find(&self, id: &SessionId) -> Result<Option<SessionMemory>, RepositoryError> {
        // One read transaction so the record and its turns come from the same snapshot.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT session_id, subject_name, narrative, structured_fields,
                    research_updated_at, sender_profile, created_at
             FROM memory_session WHERE session_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let turn_rows = sqlx::query(
            "SELECT question, answer FROM memory_turn
             WHERE session_id = ? ORDER BY turn_number ASC",
        )
        .bind(id.as_str())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let created_at: String = row.try_get("created_at").map_err(decode_err)?;
        let turn_history = turn_rows.iter().map(row_to_turn).collect::<Result<Vec<_>, _>>()?;

        Ok(Some(SessionMemory {
            session_id: id.clone(),
            research: row_to_research(&row)?,
            sender: row_to_sender(&row)?,
            turn_history,
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    async fn create_if_absent(&self, id: &SessionId) -> Result<SessionMemory, RepositoryError> {
        sqlx::query(
            "INSERT INTO memory_session (session_id, created_at) VALUES (?, ?)
             ON CONFLICT(session_id) DO NOTHING",
        )
        .bind(id.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find(id).await?.ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn save_research(
        &self,
        id: &SessionId,
        research: &ResearchResult,
    ) -> Result<(), RepositoryError> {
        let fields_json = serde_json::to_string(research.structured_fields()).map_err(decode_err)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO memory_session (session_id, subject_name, narrative, structured_fields,
                                         research_updated_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                subject_name = excluded.subject_name,
                narrative = excluded.narrative,
                structured_fields = excluded.structured_fields,
                research_updated_at = excluded.research_updated_at",
        )
        .bind(id.as_str())
        .bind(research.subject_name())
        .bind(research.narrative())
        .bind(fields_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_sender(
        &self,
        id: &SessionId,
        sender: &SenderProfile,
    ) -> Result<(), RepositoryError> {
        let sender_json = serde_json::to_string(sender).map_err(decode_err)?;

        sqlx::query(
            "INSERT INTO memory_session (session_id, sender_profile, created_at) VALUES (?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET sender_profile = excluded.sender_profile",
        )
        .bind(id.as_str())
        .bind(sender_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_turn(&self, id: &SessionId, turn: &Turn) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            "INSERT INTO memory_turn (session_id, turn_number, question, answer, created_at)
             SELECT ?, COALESCE(MAX(turn_number), 0) + 1, ?, ?, ?
             FROM memory_turn WHERE session_id = ?
             RETURNING turn_number",
        )
        .bind(id.as_str())
        .bind(&turn.question)
        .bind(&turn.answer)
        .bind(Utc::now().to_rfc3339())
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                RepositoryError::NotFound(id.to_string())
            }
            other => RepositoryError::Database(other),
        })?;

        let turn_number: i64 = row.try_get("turn_number").map_err(decode_err)?;
        u32::try_from(turn_number).map_err(decode_err)
    }

    async fn list_ids(&self) -> Result<Vec<SessionId>, RepositoryError> {
        let rows = sqlx::query("SELECT session_id FROM memory_session ORDER BY rowid ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_id).collect()
    }

    async fn search(&self, query: &str) -> Result<Vec<MemoryHit>, RepositoryError> {
        // SQLite LIKE only folds ASCII case, and JSON escapes quotes and backslashes, so such
        // queries fall back to scanning every session.
        let candidates = if query.is_ascii() && !query.contains(['"', '\\']) {
            let pattern = like_pattern(query.trim());
            let rows = sqlx::query(
                "SELECT s.session_id FROM memory_session s
                 WHERE s.subject_name LIKE ? ESCAPE '\\'
                    OR s.narrative LIKE ? ESCAPE '\\'
                    OR s.structured_fields LIKE ? ESCAPE '\\'
                    OR EXISTS (
                        SELECT 1 FROM memory_turn t
                        WHERE t.session_id = s.session_id
                          AND (t.question LIKE ? ESCAPE '\\' OR t.answer LIKE ? ESCAPE '\\')
                    )
                 ORDER BY s.rowid ASC",
            )
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(row_to_id).collect::<Result<Vec<_>, _>>()?
        } else {
            self.list_ids().await?
        };

        let mut hits = Vec::new();
        for id in candidates {
            let Some(memory) = self.find(&id).await? else {
                continue;
            };
            if let Some(excerpt) = memory.excerpt_matching(query) {
                hits.push(MemoryHit { session_id: id, excerpt });
            }
        }
        Ok(hits)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
