use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::flows::states::{
    ApprovalEvent, ApprovalState, FlowAction, FlowContext, TransitionOutcome,
};

pub trait FlowDefinition {
    fn name(&self) -> &'static str;
    fn initial_state(&self) -> ApprovalState;
    fn transition(
        &self,
        current: &ApprovalState,
        event: &ApprovalEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct OutreachApprovalFlow;

impl FlowDefinition for OutreachApprovalFlow {
    fn name(&self) -> &'static str {
        "outreach_approval"
    }

    fn initial_state(&self) -> ApprovalState {
        ApprovalState::Drafting
    }

    fn transition(
        &self,
        current: &ApprovalState,
        event: &ApprovalEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_outreach(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn name(&self) -> &'static str {
        self.flow.name()
    }

    pub fn initial_state(&self) -> ApprovalState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &ApprovalState,
        event: &ApprovalEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &ApprovalState,
        event: &ApprovalEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => sink.emit(
                audit
                    .event("flow.transition_applied", AuditCategory::Flow, AuditOutcome::Success)
                    .with("flow", self.name())
                    .with("from", outcome.from.as_str())
                    .with("to", outcome.to.as_str())
                    .with("event", format!("{:?}", outcome.event))
                    .with("attempts_used", context.attempts_used),
            ),
            Err(error) => sink.emit(
                audit
                    .event("flow.transition_rejected", AuditCategory::Flow, AuditOutcome::Rejected)
                    .with("flow", self.name())
                    .with("error", error),
            ),
        }
        result
    }
}

impl Default for FlowEngine<OutreachApprovalFlow> {
    fn default() -> Self {
        Self::new(OutreachApprovalFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("session already reached terminal state {state:?}; {event:?} is not accepted")]
    TerminalState { state: ApprovalState, event: ApprovalEvent },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: ApprovalState, event: ApprovalEvent },
    #[error("all {budget} draft attempts have been used")]
    AttemptsExhausted { attempts_used: u32, budget: u32 },
}

fn transition_outreach(
    current: &ApprovalState,
    event: &ApprovalEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use ApprovalEvent::{
        AbandonRequested, ApprovalGranted, DeliveryConfirmed, DraftEdited, GenerationRequested,
        DraftSubmitted, RejectionRecorded,
    };
    use ApprovalState::{Abandoned, Approved, Drafting, Edited, PendingApproval, Sent};
    use FlowAction::{
        AwaitHumanDecision, CloseSession, DeliverDraft, RecordDelivery, RegenerateDraft,
        SubmitForApproval,
    };

    if current.is_terminal() {
        return Err(FlowTransitionError::TerminalState { state: *current, event: *event });
    }

    let (to, actions) = match (current, event) {
        (Drafting, GenerationRequested) => {
            if !context.can_generate() {
                return Err(FlowTransitionError::AttemptsExhausted {
                    attempts_used: context.attempts_used,
                    budget: context.generation_budget(),
                });
            }
            (Drafting, vec![SubmitForApproval])
        }
        (Drafting, DraftSubmitted) => (PendingApproval, vec![AwaitHumanDecision]),
        (PendingApproval, ApprovalGranted) => (Approved, vec![DeliverDraft]),
        (PendingApproval, DraftEdited) => (Edited, vec![DeliverDraft]),
        (PendingApproval, RejectionRecorded) => {
            if context.can_regenerate_after_rejection() {
                (Drafting, vec![RegenerateDraft])
            } else {
                (Abandoned, vec![CloseSession])
            }
        }
        (Approved, DeliveryConfirmed) | (Edited, DeliveryConfirmed) => {
            (Sent, vec![RecordDelivery])
        }
        (_, AbandonRequested) => (Abandoned, vec![CloseSession]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition { state: *current, event: *event });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: *event, actions })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, AuditOutcome, RecordingAuditSink};
    use crate::flows::engine::{
        FlowDefinition, FlowEngine, FlowTransitionError, OutreachApprovalFlow,
    };
    use crate::flows::states::{ApprovalEvent, ApprovalState, FlowAction, FlowContext};

    #[test]
    fn approval_happy_path_reaches_sent() {
        let engine = FlowEngine::new(OutreachApprovalFlow);
        let context = FlowContext::new(1, 3);
        let mut state = engine.initial_state();
        assert_eq!(state, ApprovalState::Drafting);

        state = engine
            .apply(&state, &ApprovalEvent::DraftSubmitted, &context)
            .expect("drafting -> pending")
            .to;
        let approved = engine
            .apply(&state, &ApprovalEvent::ApprovalGranted, &context)
            .expect("pending -> approved");
        assert_eq!(approved.to, ApprovalState::Approved);
        assert_eq!(approved.actions, vec![FlowAction::DeliverDraft]);

        state = engine
            .apply(&approved.to, &ApprovalEvent::DeliveryConfirmed, &context)
            .expect("approved -> sent")
            .to;
        assert_eq!(state, ApprovalState::Sent);
    }

    #[test]
    fn rejection_regenerates_while_attempts_remain() {
        let engine = FlowEngine::default();
        let outcome = engine
            .apply(
                &ApprovalState::PendingApproval,
                &ApprovalEvent::RejectionRecorded,
                &FlowContext::new(2, 3),
            )
            .expect("pending -> drafting");
        assert_eq!(outcome.to, ApprovalState::Drafting);
        assert_eq!(outcome.actions, vec![FlowAction::RegenerateDraft]);
    }

    #[test]
    fn rejection_abandons_once_attempts_are_used() {
        let engine = FlowEngine::default();
        for (attempts_used, max_attempts) in [(3, 3), (1, 1), (1, 0), (1, -4)] {
            let outcome = engine
                .apply(
                    &ApprovalState::PendingApproval,
                    &ApprovalEvent::RejectionRecorded,
                    &FlowContext::new(attempts_used, max_attempts),
                )
                .expect("rejection is always accepted while pending");
            assert_eq!(outcome.to, ApprovalState::Abandoned, "max_attempts={max_attempts}");
        }
    }

    #[test]
    fn first_draft_is_allowed_for_non_positive_budgets() {
        let engine = FlowEngine::default();
        let context = FlowContext::new(0, 0);
        assert!(engine.apply(&ApprovalState::Drafting, &ApprovalEvent::GenerationRequested, &context).is_ok());

        let error = engine
            .apply(&ApprovalState::Drafting, &ApprovalEvent::GenerationRequested, &FlowContext::new(1, 0))
            .expect_err("second draft exceeds budget");
        assert_eq!(error, FlowTransitionError::AttemptsExhausted { attempts_used: 1, budget: 1 });
    }

    #[test]
    fn terminal_states_reject_every_event() {
        let engine = FlowEngine::default();
        let events = [
            ApprovalEvent::GenerationRequested,
            ApprovalEvent::DraftSubmitted,
            ApprovalEvent::ApprovalGranted,
            ApprovalEvent::RejectionRecorded,
            ApprovalEvent::DraftEdited,
            ApprovalEvent::DeliveryConfirmed,
            ApprovalEvent::AbandonRequested,
        ];
        for state in [ApprovalState::Sent, ApprovalState::Abandoned] {
            for event in events {
                let error = engine
                    .apply(&state, &event, &FlowContext::default())
                    .expect_err("terminal state must reject");
                assert!(matches!(error, FlowTransitionError::TerminalState { .. }));
            }
        }
    }

    #[test]
    fn decisions_outside_pending_approval_are_invalid() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(&ApprovalState::Drafting, &ApprovalEvent::ApprovalGranted, &FlowContext::default())
            .expect_err("cannot approve before submission");
        assert_eq!(
            error,
            FlowTransitionError::InvalidTransition {
                state: ApprovalState::Drafting,
                event: ApprovalEvent::ApprovalGranted,
            }
        );
    }

    #[test]
    fn audit_sink_records_applied_and_rejected_transitions() {
        let engine = FlowEngine::default();
        let sink = RecordingAuditSink::default();
        let audit = AuditContext::new(Some("approval-1".to_owned()), "req-9", "tester");

        let _ = engine.apply_with_audit(
            &ApprovalState::Drafting,
            &ApprovalEvent::DraftSubmitted,
            &FlowContext::default(),
            &sink,
            &audit,
        );
        let _ = engine.apply_with_audit(
            &ApprovalState::Sent,
            &ApprovalEvent::ApprovalGranted,
            &FlowContext::default(),
            &sink,
            &audit,
        );

        let events = sink.recorded();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, "flow.transition_applied");
        assert_eq!(events[0].field("to"), Some("pending_approval"));
        assert_eq!(events[1].outcome, AuditOutcome::Rejected);
        assert_eq!(events[1].session_id.as_deref(), Some("approval-1"));
        assert_eq!(OutreachApprovalFlow.name(), "outreach_approval");
    }
}
