use serde::Serialize;
use thiserror::Error;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    InvalidState(#[from] FlowTransitionError),
    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("no research stored for session `{session_id}`")]
    NoResearch { session_id: String },
    #[error("inconsistent session: {0}")]
    Inconsistent(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("research unavailable: {0}")]
    ResearchUnavailable(String),
    #[error("draft generation failed: {0}")]
    Generation(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("session storage failed: {0}")]
    Persistence(String),
    #[error("misconfigured: {0}")]
    Configuration(String),
}

/// Stable, caller-facing classification of every failure path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ResearchUnavailable,
    Generation,
    Delivery,
    NoResearch,
    InvalidState,
    InvalidInput,
    Persistence,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResearchUnavailable => "research_unavailable",
            Self::Generation => "generation",
            Self::Delivery => "delivery",
            Self::NoResearch => "no_research",
            Self::InvalidState => "invalid_state",
            Self::InvalidInput => "invalid_input",
            Self::Persistence => "persistence",
            Self::Configuration => "configuration",
        }
    }
}

impl ApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(DomainError::InvalidState(_)) => ErrorKind::InvalidState,
            Self::Domain(DomainError::NoResearch { .. }) => ErrorKind::NoResearch,
            Self::Domain(
                DomainError::MissingFields { .. }
                | DomainError::InvalidField { .. }
                | DomainError::Inconsistent(_),
            ) => ErrorKind::InvalidInput,
            Self::ResearchUnavailable(_) => ErrorKind::ResearchUnavailable,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Delivery(_) => ErrorKind::Delivery,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Usage errors are not worth re-invoking; everything else can be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::InvalidState | ErrorKind::Configuration)
    }

    pub fn missing_fields(&self) -> &[String] {
        match self {
            Self::Domain(DomainError::MissingFields { fields }) => fields,
            _ => &[],
        }
    }

    /// Classifies the failure for an outer surface and stamps it with the request's id.
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let kind = self.kind();
        let class = match kind {
            ErrorKind::InvalidInput | ErrorKind::NoResearch => InterfaceClass::BadRequest,
            ErrorKind::InvalidState => InterfaceClass::Conflict,
            ErrorKind::ResearchUnavailable
            | ErrorKind::Generation
            | ErrorKind::Delivery
            | ErrorKind::Persistence => InterfaceClass::Unavailable,
            ErrorKind::Configuration => InterfaceClass::Internal,
        };
        InterfaceError {
            class,
            kind,
            message: self.to_string(),
            correlation_id: correlation_id.into(),
        }
    }
}

/// How an outer surface should treat a failure, independent of transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceClass {
    BadRequest,
    Conflict,
    Unavailable,
    Internal,
}

impl InterfaceClass {
    /// Text safe to show a caller who should not see internals.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::BadRequest => "Check the submitted lead details and try again.",
            Self::Conflict => "The session is not in a state that accepts this request.",
            Self::Unavailable => "A research, drafting or storage dependency is unavailable.",
            Self::Internal => "The service is misconfigured.",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind:?} ({correlation_id}): {message}")]
pub struct InterfaceError {
    pub class: InterfaceClass,
    pub kind: ErrorKind,
    pub message: String,
    pub correlation_id: String,
}
