use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    PendingApproval,
    Approved,
    Rejected,
    Edited,
    Sent,
    Abandoned,
}

impl DraftStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Abandoned)
    }
}

/// Subject and body as returned by a draft generator, before it becomes a tracked draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContent {
    pub subject_line: String,
    pub body: String,
}

impl DraftContent {
    pub fn new(subject_line: impl Into<String>, body: impl Into<String>) -> Self {
        Self { subject_line: subject_line.into(), body: body.into() }
    }

    /// Names the first missing part, if any.
    pub fn malformed_reason(&self) -> Option<&'static str> {
        if self.subject_line.trim().is_empty() {
            Some("draft is missing a subject line")
        } else if self.body.trim().is_empty() {
            Some("draft body is empty")
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachDraft {
    pub subject_name: String,
    pub subject_email: String,
    pub subject_line: String,
    pub body: String,
    pub attempt_number: u32,
    pub status: DraftStatus,
    pub created_at: DateTime<Utc>,
}

impl OutreachDraft {
    pub fn from_content(
        subject_name: impl Into<String>,
        subject_email: impl Into<String>,
        content: DraftContent,
        attempt_number: u32,
    ) -> Self {
        Self {
            subject_name: subject_name.into(),
            subject_email: subject_email.into(),
            subject_line: content.subject_line.trim().to_owned(),
            body: content.body.trim().to_owned(),
            attempt_number: attempt_number.max(1),
            status: DraftStatus::PendingApproval,
            created_at: Utc::now(),
        }
    }
}
