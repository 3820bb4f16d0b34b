use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contact::SenderProfile;
use crate::domain::research::ResearchResult;
use crate::errors::DomainError;

/// Longest excerpt returned by [`SessionMemory::excerpt_matching`], in characters.
pub const EXCERPT_CHARS: usize = 100;

/// Non-blank, trimmed session key. Only obtainable through [`SessionId::parse`] or
/// [`SessionId::for_lead`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidField {
                field: "session_id".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Conventional key for a lead conversation, e.g. `lead:jane doe`.
    pub fn for_lead(name: &str) -> Self {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        Self(format!("lead:{normalized}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = DomainError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionMemory {
    pub session_id: SessionId,
    pub research: Option<ResearchResult>,
    pub sender: Option<SenderProfile>,
    pub turn_history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

impl SessionMemory {
    pub fn empty(session_id: SessionId, created_at: DateTime<Utc>) -> Self {
        Self { session_id, research: None, sender: None, turn_history: Vec::new(), created_at }
    }

    pub fn has_research(&self) -> bool {
        self.research.is_some()
    }

    /// First stored text containing `query` (case-insensitive), cut to [`EXCERPT_CHARS`].
    ///
    /// Research is scanned before the conversation: subject name, narrative, structured field
    /// values, then each turn's question and answer.
    pub fn excerpt_matching(&self, query: &str) -> Option<String> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let mut texts: Vec<String> = Vec::new();
        if let Some(research) = &self.research {
            texts.push(research.subject_name().to_owned());
            texts.push(research.narrative().to_owned());
            texts.extend(research.structured_fields().values().map(|value| value.render()));
        }
        for turn in &self.turn_history {
            texts.push(turn.question.clone());
            texts.push(turn.answer.clone());
        }

        texts
            .into_iter()
            .find(|text| text.to_lowercase().contains(&needle))
            .map(|text| text.chars().take(EXCERPT_CHARS).collect())
    }
}

/// One session returned by a memory search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemoryHit {
    pub session_id: SessionId,
    pub excerpt: String,
}
