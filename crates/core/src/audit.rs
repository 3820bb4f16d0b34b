//! Structured audit trail for approval-loop decisions.
//!
//! Events are built from an [`AuditContext`] so every record carries the session and correlation
//! identifiers of the loop that produced it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Flow,
    Delivery,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

/// Who is acting, on which session, under which correlation id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditContext {
    pub session_id: Option<String>,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        session_id: Option<String>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self { session_id, correlation_id: correlation_id.into(), actor: actor.into() }
    }

    pub fn event(
        &self,
        kind: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent {
            kind: kind.into(),
            category,
            outcome,
            session_id: self.session_id.clone(),
            correlation_id: self.correlation_id.clone(),
            actor: self.actor.clone(),
            fields: BTreeMap::new(),
            at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub kind: String,
    pub category: AuditCategory,
    pub outcome: AuditOutcome,
    pub session_id: Option<String>,
    pub correlation_id: String,
    pub actor: String,
    pub fields: BTreeMap<String, String>,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.fields.insert(key.to_owned(), value.to_string());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Keeps every event in memory; used by tests to assert on the trail.
#[derive(Clone, Default)]
pub struct RecordingAuditSink {
    recorded: Arc<Mutex<Vec<AuditEvent>>>,
}

impl RecordingAuditSink {
    pub fn recorded(&self) -> Vec<AuditEvent> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }
}

impl AuditSink for RecordingAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

/// Writes events through the `tracing` subscriber installed by the binary.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let fields = serde_json::to_string(&event.fields).unwrap_or_default();
        let session_id = event.session_id.as_deref().unwrap_or("-");
        if event.outcome == AuditOutcome::Success {
            tracing::info!(
                event_name = %event.kind,
                correlation_id = %event.correlation_id,
                session_id,
                actor = %event.actor,
                category = ?event.category,
                fields = %fields,
                "audit"
            );
        } else {
            tracing::warn!(
                event_name = %event.kind,
                correlation_id = %event.correlation_id,
                session_id,
                actor = %event.actor,
                category = ?event.category,
                outcome = ?event.outcome,
                fields = %fields,
                "audit"
            );
        }
    }
}
