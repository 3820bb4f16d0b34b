use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Drafting,
    PendingApproval,
    Approved,
    Edited,
    Sent,
    Abandoned,
}

impl ApprovalState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Abandoned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drafting => "drafting",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Edited => "edited",
            Self::Sent => "sent",
            Self::Abandoned => "abandoned",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalEvent {
    GenerationRequested,
    DraftSubmitted,
    ApprovalGranted,
    RejectionRecorded,
    DraftEdited,
    DeliveryConfirmed,
    AbandonRequested,
}

/// Attempt accounting the flow needs to decide between regeneration and abandonment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    pub attempts_used: u32,
    pub max_attempts: i32,
}

impl Default for FlowContext {
    fn default() -> Self {
        Self { attempts_used: 0, max_attempts: 3 }
    }
}

impl FlowContext {
    pub fn new(attempts_used: u32, max_attempts: i32) -> Self {
        Self { attempts_used, max_attempts }
    }

    /// The first draft is always allowed, even when `max_attempts` is zero or negative.
    pub fn generation_budget(&self) -> u32 {
        u32::try_from(self.max_attempts).unwrap_or(0).max(1)
    }

    pub fn can_generate(&self) -> bool {
        self.attempts_used < self.generation_budget()
    }

    pub fn can_regenerate_after_rejection(&self) -> bool {
        i64::from(self.attempts_used) < i64::from(self.max_attempts)
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.generation_budget().saturating_sub(self.attempts_used)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    SubmitForApproval,
    AwaitHumanDecision,
    DeliverDraft,
    RegenerateDraft,
    RecordDelivery,
    CloseSession,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ApprovalState,
    pub to: ApprovalState,
    pub event: ApprovalEvent,
    pub actions: Vec<FlowAction>,
}
