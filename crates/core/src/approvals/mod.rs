//! Human-in-the-loop approval with bounded regeneration.
//!
//! [`ApprovalController`] drives one [`ApprovalSession`] from `Drafting` to exactly one
//! terminal outcome (`Sent` or `Abandoned`). Every transition goes through the
//! [`FlowEngine`] and is recorded on the audit sink.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::contact::SenderProfile;
use crate::domain::draft::{DraftStatus, OutreachDraft};
use crate::domain::research::ResearchResult;
use crate::errors::{ApplicationError, DomainError};
use crate::flows::{
    ApprovalEvent, ApprovalState, FlowContext, FlowEngine, OutreachApprovalFlow, TransitionOutcome,
};
use crate::ports::{DeliveryChannel, DraftGenerator};

pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalSessionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApprovalSession {
    pub id: ApprovalSessionId,
    pub subject_name: String,
    pub subject_email: String,
    pub sender: SenderProfile,
    pub max_attempts: i32,
    pub attempts_used: u32,
    pub state: ApprovalState,
    pub current_draft: Option<OutreachDraft>,
    pub feedback_history: Vec<String>,
    pub delivery_id: Option<String>,
}

impl ApprovalSession {
    pub fn new(
        subject_name: impl Into<String>,
        subject_email: impl Into<String>,
        sender: SenderProfile,
        max_attempts: i32,
    ) -> Self {
        Self {
            id: ApprovalSessionId(format!("approval-{}", Uuid::new_v4())),
            subject_name: subject_name.into(),
            subject_email: subject_email.into(),
            sender,
            max_attempts,
            attempts_used: 0,
            state: ApprovalState::Drafting,
            current_draft: None,
            feedback_history: Vec::new(),
            delivery_id: None,
        }
    }

    pub fn flow_context(&self) -> FlowContext {
        FlowContext::new(self.attempts_used, self.max_attempts)
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.flow_context().attempts_remaining()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Non-empty rejection feedback, oldest first.
    pub fn grounding_feedback(&self) -> Vec<String> {
        self.feedback_history.iter().filter(|entry| !entry.trim().is_empty()).cloned().collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject { feedback: String },
    Edit { subject_line: String, body: String },
}

impl Decision {
    fn event(&self) -> ApprovalEvent {
        match self {
            Self::Approve => ApprovalEvent::ApprovalGranted,
            Self::Reject { .. } => ApprovalEvent::RejectionRecorded,
            Self::Edit { .. } => ApprovalEvent::DraftEdited,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject { .. } => "reject",
            Self::Edit { .. } => "edit",
        }
    }
}

pub struct ApprovalController<G, D, S> {
    flow: FlowEngine<OutreachApprovalFlow>,
    generator: G,
    delivery: D,
    sink: S,
    actor: String,
}

impl<G, D, S> ApprovalController<G, D, S>
where
    G: DraftGenerator,
    D: DeliveryChannel,
    S: AuditSink,
{
    pub fn new(generator: G, delivery: D, sink: S) -> Self {
        Self {
            flow: FlowEngine::default(),
            generator,
            delivery,
            sink,
            actor: "approval-controller".to_owned(),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn start(
        &self,
        subject_name: impl Into<String>,
        subject_email: impl Into<String>,
        sender: SenderProfile,
        max_attempts: i32,
    ) -> ApprovalSession {
        let session = ApprovalSession::new(subject_name, subject_email, sender, max_attempts);
        info!(
            event_name = "approval.session_started",
            session_id = %session.id.0,
            max_attempts,
            "approval session started"
        );
        session
    }

    /// Asks the generator for a new draft grounded on prior rejection feedback.
    ///
    /// A failed or malformed generation leaves the session in `Drafting` and does not use up
    /// an attempt.
    pub async fn generate_draft(
        &self,
        session: &mut ApprovalSession,
        research: &ResearchResult,
        feedback: Option<&str>,
    ) -> Result<OutreachDraft, ApplicationError> {
        self.transition(session, ApprovalEvent::GenerationRequested)?;

        let mut grounding = session.grounding_feedback();
        if let Some(extra) = feedback.map(str::trim).filter(|extra| !extra.is_empty()) {
            if !grounding.iter().any(|entry| entry.trim() == extra) {
                grounding.push(extra.to_owned());
            }
        }

        let content = match self.generator.generate(research, &session.sender, &grounding).await
        {
            Ok(content) => content,
            Err(error) => {
                let error = as_generation_error(error);
                self.record_failure(session, "draft.generation_failed", &error);
                return Err(error);
            }
        };

        if let Some(reason) = content.malformed_reason() {
            let error = ApplicationError::Generation(reason.to_owned());
            self.record_failure(session, "draft.generation_failed", &error);
            return Err(error);
        }

        session.attempts_used += 1;
        let draft = OutreachDraft::from_content(
            session.subject_name.clone(),
            session.subject_email.clone(),
            content,
            session.attempts_used,
        );
        session.current_draft = Some(draft.clone());

        info!(
            event_name = "approval.draft_generated",
            session_id = %session.id.0,
            attempt_number = draft.attempt_number,
            feedback_items = grounding.len(),
            "draft generated"
        );
        Ok(draft)
    }

    /// Puts the draft produced by the latest [`generate_draft`](Self::generate_draft) call in
    /// front of the reviewer. Any other draft is refused, so every review consumes an attempt.
    pub fn submit_for_approval(
        &self,
        session: &mut ApprovalSession,
        mut draft: OutreachDraft,
    ) -> Result<ApprovalState, ApplicationError> {
        if !session.is_terminal() {
            if let Err(error) = ensure_generated(session, &draft) {
                self.record_failure(session, "draft.submission_refused", &error);
                return Err(error);
            }
        }
        let outcome = self.transition(session, ApprovalEvent::DraftSubmitted)?;
        draft.status = DraftStatus::PendingApproval;
        session.current_draft = Some(draft);
        session.state = outcome.to;
        Ok(session.state)
    }

    pub async fn record_decision(
        &self,
        session: &mut ApprovalSession,
        decision: Decision,
    ) -> Result<ApprovalState, ApplicationError> {
        let outcome = self.transition(session, decision.event())?;
        info!(
            event_name = "approval.decision_recorded",
            session_id = %session.id.0,
            decision = decision.name(),
            to = outcome.to.as_str(),
            "decision recorded"
        );

        match decision {
            Decision::Approve => {
                self.set_draft_status(session, DraftStatus::Approved)?;
                session.state = outcome.to;
                self.deliver(session).await
            }
            Decision::Edit { subject_line, body } => {
                let draft = self.current_draft_mut(session)?;
                draft.subject_line = subject_line;
                draft.body = body;
                draft.status = DraftStatus::Edited;
                session.state = outcome.to;
                self.deliver(session).await
            }
            Decision::Reject { feedback } => {
                session.feedback_history.push(feedback.trim().to_owned());
                let status = if outcome.to == ApprovalState::Abandoned {
                    DraftStatus::Abandoned
                } else {
                    DraftStatus::Rejected
                };
                self.set_draft_status(session, status)?;
                session.state = outcome.to;
                Ok(session.state)
            }
        }
    }

    /// Ends a non-terminal session without sending anything.
    pub fn abandon(
        &self,
        session: &mut ApprovalSession,
    ) -> Result<ApprovalState, ApplicationError> {
        let outcome = self.transition(session, ApprovalEvent::AbandonRequested)?;
        if let Some(draft) = session.current_draft.as_mut() {
            draft.status = DraftStatus::Abandoned;
        }
        session.state = outcome.to;
        Ok(session.state)
    }

    async fn deliver(
        &self,
        session: &mut ApprovalSession,
    ) -> Result<ApprovalState, ApplicationError> {
        let sent = {
            let draft = session.current_draft.as_ref().ok_or_else(missing_draft)?;
            self.delivery.send(draft).await
        };

        match sent {
            Ok(delivery_id) => {
                let outcome = self.transition(session, ApprovalEvent::DeliveryConfirmed)?;
                self.set_draft_status(session, DraftStatus::Sent)?;
                session.state = outcome.to;
                info!(
                    event_name = "approval.draft_sent",
                    session_id = %session.id.0,
                    delivery_id = %delivery_id,
                    "draft delivered"
                );
                session.delivery_id = Some(delivery_id);
                Ok(session.state)
            }
            Err(error) => {
                let error = match error {
                    ApplicationError::Delivery(_) => error,
                    other => ApplicationError::Delivery(other.to_string()),
                };
                self.record_failure(session, "delivery.failed", &error);
                Err(error)
            }
        }
    }

    fn transition(
        &self,
        session: &ApprovalSession,
        event: ApprovalEvent,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.flow
            .apply_with_audit(
                &session.state,
                &event,
                &session.flow_context(),
                &self.sink,
                &self.audit_context(session),
            )
            .map_err(|error| ApplicationError::from(DomainError::from(error)))
    }

    fn audit_context(&self, session: &ApprovalSession) -> AuditContext {
        AuditContext::new(Some(session.id.0.clone()), session.id.0.clone(), self.actor.clone())
    }

    fn record_failure(
        &self,
        session: &ApprovalSession,
        event_type: &str,
        error: &ApplicationError,
    ) {
        warn!(
            event_name = event_type,
            session_id = %session.id.0,
            state = session.state.as_str(),
            error = %error,
            "approval step failed"
        );
        let category = match error {
            ApplicationError::Delivery(_) => AuditCategory::Delivery,
            _ => AuditCategory::Flow,
        };
        self.sink.emit(
            self.audit_context(session)
                .event(event_type, category, AuditOutcome::Failed)
                .with("state", session.state.as_str())
                .with("error", error),
        );
    }

    fn current_draft_mut<'a>(
        &self,
        session: &'a mut ApprovalSession,
    ) -> Result<&'a mut OutreachDraft, ApplicationError> {
        session.current_draft.as_mut().ok_or_else(missing_draft)
    }

    fn set_draft_status(
        &self,
        session: &mut ApprovalSession,
        status: DraftStatus,
    ) -> Result<(), ApplicationError> {
        self.current_draft_mut(session)?.status = status;
        Ok(())
    }
}

/// The submitted draft must be the unreviewed output of the attempt just generated.
fn ensure_generated(
    session: &ApprovalSession,
    draft: &OutreachDraft,
) -> Result<(), ApplicationError> {
    let generated = session.current_draft.as_ref().is_some_and(|current| {
        session.attempts_used >= 1
            && current.status == DraftStatus::PendingApproval
            && current.attempt_number == session.attempts_used
            && draft.attempt_number == current.attempt_number
    });
    if generated {
        return Ok(());
    }
    Err(DomainError::Inconsistent(format!(
        "draft for attempt {} was not generated for this session ({} attempt(s) used)",
        draft.attempt_number, session.attempts_used
    ))
    .into())
}

fn missing_draft() -> ApplicationError {
    DomainError::Inconsistent("approval session has no current draft".to_owned()).into()
}

fn as_generation_error(error: ApplicationError) -> ApplicationError {
    match error {
        ApplicationError::Generation(_) => error,
        other => ApplicationError::Generation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{ApprovalController, ApprovalSession, Decision};
    use crate::audit::{AuditOutcome, RecordingAuditSink};
    use crate::domain::contact::SenderProfile;
    use crate::domain::draft::{DraftContent, DraftStatus, OutreachDraft};
    use crate::domain::research::{FieldValue, ResearchResult};
    use crate::errors::{ApplicationError, ErrorKind};
    use crate::flows::ApprovalState;
    use crate::ports::{DeliveryChannel, DraftGenerator};

    #[derive(Clone, Default)]
    struct ScriptedGenerator {
        responses: Arc<Mutex<VecDeque<Result<DraftContent, ApplicationError>>>>,
        seen_feedback: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl ScriptedGenerator {
        fn always_ok() -> Self {
            Self::default()
        }

        fn scripted(responses: Vec<Result<DraftContent, ApplicationError>>) -> Self {
            Self { responses: Arc::new(Mutex::new(responses.into())), ..Self::default() }
        }

        fn feedback_calls(&self) -> Vec<Vec<String>> {
            self.seen_feedback.lock().expect("feedback lock").clone()
        }
    }

    #[async_trait]
    impl DraftGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            research: &ResearchResult,
            _sender: &SenderProfile,
            feedback: &[String],
        ) -> Result<DraftContent, ApplicationError> {
            self.seen_feedback.lock().expect("feedback lock").push(feedback.to_vec());
            let scripted = self.responses.lock().expect("responses lock").pop_front();
            scripted.unwrap_or_else(|| {
                Ok(DraftContent::new(
                    format!("Hello {}", research.subject_name()),
                    "Would love to connect about your recent work.",
                ))
            })
        }
    }

    #[derive(Clone, Default)]
    struct RecordingDelivery {
        fail: bool,
        sent: Arc<Mutex<Vec<OutreachDraft>>>,
    }

    #[async_trait]
    impl DeliveryChannel for RecordingDelivery {
        async fn send(&self, draft: &OutreachDraft) -> Result<String, ApplicationError> {
            if self.fail {
                return Err(ApplicationError::Delivery("smtp relay refused".to_owned()));
            }
            let mut sent = self.sent.lock().expect("sent lock");
            sent.push(draft.clone());
            Ok(format!("MSG-{:08X}", sent.len()))
        }
    }

    fn research() -> ResearchResult {
        ResearchResult::new(
            "Jane Doe",
            "Jane leads the data platform team at Acme.",
            BTreeMap::from([("company".to_owned(), FieldValue::Text("Acme".to_owned()))]),
        )
        .expect("valid research")
    }

    fn sender() -> SenderProfile {
        SenderProfile {
            name: Some("Sam".to_owned()),
            career_field: "Data Engineering".to_owned(),
            career_description: "Pipeline specialist".to_owned(),
        }
    }

    fn controller(
        generator: ScriptedGenerator,
        delivery: RecordingDelivery,
    ) -> (
        ApprovalController<ScriptedGenerator, RecordingDelivery, RecordingAuditSink>,
        RecordingAuditSink,
    ) {
        let sink = RecordingAuditSink::default();
        (ApprovalController::new(generator, delivery, sink.clone()), sink)
    }

    async fn draft_and_submit(
        controller: &ApprovalController<ScriptedGenerator, RecordingDelivery, RecordingAuditSink>,
        session: &mut ApprovalSession,
    ) -> OutreachDraft {
        let draft = controller
            .generate_draft(session, &research(), None)
            .await
            .expect("draft generation should succeed");
        controller.submit_for_approval(session, draft.clone()).expect("submit");
        draft
    }

    fn session(max_attempts: i32) -> ApprovalSession {
        ApprovalSession::new("Jane Doe", "jane@example.com", sender(), max_attempts)
    }

    #[tokio::test]
    async fn approve_sends_once_and_records_delivery_id() {
        let delivery = RecordingDelivery::default();
        let (controller, sink) = controller(ScriptedGenerator::always_ok(), delivery.clone());
        let mut session = session(3);

        draft_and_submit(&controller, &mut session).await;
        assert_eq!(session.state, ApprovalState::PendingApproval);

        let state = controller.record_decision(&mut session, Decision::Approve).await.expect("approve");
        assert_eq!(state, ApprovalState::Sent);
        assert_eq!(session.delivery_id.as_deref(), Some("MSG-00000001"));
        assert_eq!(session.current_draft.as_ref().map(|draft| draft.status), Some(DraftStatus::Sent));
        assert_eq!(delivery.sent.lock().expect("sent lock").len(), 1);

        let error = controller
            .record_decision(&mut session, Decision::Approve)
            .await
            .expect_err("second decision must fail");
        assert_eq!(error.kind(), ErrorKind::InvalidState);
        assert_eq!(delivery.sent.lock().expect("sent lock").len(), 1);
        assert!(sink.recorded().iter().any(|event| event.outcome == AuditOutcome::Rejected));
    }

    #[tokio::test]
    async fn three_rejections_abandon_with_feedback_in_order() {
        let generator = ScriptedGenerator::always_ok();
        let (controller, _) = controller(generator.clone(), RecordingDelivery::default());
        let mut session = session(3);

        for feedback in ["too generic", "wrong tone", "still wrong"] {
            draft_and_submit(&controller, &mut session).await;
            controller
                .record_decision(&mut session, Decision::Reject { feedback: feedback.to_owned() })
                .await
                .expect("reject");
        }

        assert_eq!(session.state, ApprovalState::Abandoned);
        assert_eq!(session.feedback_history, vec!["too generic", "wrong tone", "still wrong"]);
        assert_eq!(session.attempts_used, 3);
        assert_eq!(
            generator.feedback_calls(),
            vec![
                Vec::<String>::new(),
                vec!["too generic".to_owned()],
                vec!["too generic".to_owned(), "wrong tone".to_owned()],
            ]
        );

        let error = controller
            .generate_draft(&mut session, &research(), None)
            .await
            .expect_err("abandoned session cannot regenerate");
        assert_eq!(error.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn n_rejections_always_end_abandoned() {
        for max_attempts in 0..=5 {
            let (controller, _) =
                controller(ScriptedGenerator::always_ok(), RecordingDelivery::default());
            let mut session = session(max_attempts);
            let rejections = max_attempts.max(1);

            for round in 0..rejections {
                assert_eq!(session.state, ApprovalState::Drafting, "round {round}");
                draft_and_submit(&controller, &mut session).await;
                controller
                    .record_decision(&mut session, Decision::Reject { feedback: String::new() })
                    .await
                    .expect("reject");
            }

            assert_eq!(session.state, ApprovalState::Abandoned, "max_attempts={max_attempts}");
            let error = controller
                .record_decision(&mut session, Decision::Approve)
                .await
                .expect_err("terminal session rejects decisions");
            assert_eq!(error.kind(), ErrorKind::InvalidState);
        }
    }

    #[tokio::test]
    async fn hand_built_drafts_cannot_bypass_the_attempt_budget() {
        let (controller, sink) =
            controller(ScriptedGenerator::always_ok(), RecordingDelivery::default());
        let mut session = session(3);
        let hand_built = || {
            OutreachDraft::from_content(
                "Jane Doe",
                "jane@example.com",
                DraftContent::new("Hi", "Hand-made body"),
                1,
            )
        };

        for _ in 0..10 {
            let error = controller
                .submit_for_approval(&mut session, hand_built())
                .expect_err("draft was never generated");
            assert_eq!(error.kind(), ErrorKind::InvalidInput);
            assert!(controller
                .record_decision(&mut session, Decision::Reject { feedback: "no".to_owned() })
                .await
                .is_err());
        }
        assert_eq!(session.state, ApprovalState::Drafting);
        assert_eq!(session.attempts_used, 0);
        assert!(session.feedback_history.is_empty());
        assert_eq!(sink.count("draft.submission_refused"), 10);

        // A rejected draft cannot be put back in front of the reviewer either.
        let first = draft_and_submit(&controller, &mut session).await;
        controller
            .record_decision(&mut session, Decision::Reject { feedback: "no".to_owned() })
            .await
            .expect("reject");
        assert!(controller.submit_for_approval(&mut session, first).is_err());

        for _ in 0..2 {
            draft_and_submit(&controller, &mut session).await;
            controller
                .record_decision(&mut session, Decision::Reject { feedback: "no".to_owned() })
                .await
                .expect("reject");
        }
        assert_eq!(session.state, ApprovalState::Abandoned);
        assert_eq!(session.attempts_used, 3);
    }

    #[tokio::test]
    async fn non_positive_budget_abandons_on_first_rejection() {
        let (controller, _) = controller(ScriptedGenerator::always_ok(), RecordingDelivery::default());
        let mut session = session(-2);

        draft_and_submit(&controller, &mut session).await;
        let state = controller
            .record_decision(&mut session, Decision::Reject { feedback: "no".to_owned() })
            .await
            .expect("rejection is not an error");
        assert_eq!(state, ApprovalState::Abandoned);
        assert_eq!(
            session.current_draft.as_ref().map(|draft| draft.status),
            Some(DraftStatus::Abandoned)
        );
    }

    #[tokio::test]
    async fn empty_feedback_counts_but_adds_no_grounding() {
        let generator = ScriptedGenerator::always_ok();
        let (controller, _) = controller(generator.clone(), RecordingDelivery::default());
        let mut session = session(3);

        draft_and_submit(&controller, &mut session).await;
        controller
            .record_decision(&mut session, Decision::Reject { feedback: "   ".to_owned() })
            .await
            .expect("reject");
        draft_and_submit(&controller, &mut session).await;

        assert_eq!(session.feedback_history, vec![String::new()]);
        assert_eq!(session.attempts_used, 2);
        assert_eq!(generator.feedback_calls()[1], Vec::<String>::new());
    }

    #[tokio::test]
    async fn malformed_generation_keeps_drafting_without_using_an_attempt() {
        let generator = ScriptedGenerator::scripted(vec![
            Ok(DraftContent::new("", "body without subject")),
            Err(ApplicationError::ResearchUnavailable("model offline".to_owned())),
        ]);
        let (controller, sink) = controller(generator, RecordingDelivery::default());
        let mut session = session(3);

        let malformed = controller
            .generate_draft(&mut session, &research(), None)
            .await
            .expect_err("missing subject is a generation error");
        assert_eq!(malformed.kind(), ErrorKind::Generation);

        let offline = controller
            .generate_draft(&mut session, &research(), None)
            .await
            .expect_err("collaborator failure is a generation error");
        assert_eq!(offline.kind(), ErrorKind::Generation);
        assert_eq!(session.state, ApprovalState::Drafting);
        assert_eq!(session.attempts_used, 0);

        let draft = controller
            .generate_draft(&mut session, &research(), None)
            .await
            .expect("third call succeeds");
        assert_eq!(draft.attempt_number, 1);
        assert_eq!(sink.count("draft.generation_failed"), 2);
    }

    #[tokio::test]
    async fn edit_overwrites_draft_and_sends_it() {
        let delivery = RecordingDelivery::default();
        let (controller, _) = controller(ScriptedGenerator::always_ok(), delivery.clone());
        let mut session = session(3);

        draft_and_submit(&controller, &mut session).await;
        let state = controller
            .record_decision(
                &mut session,
                Decision::Edit {
                    subject_line: "Quick question".to_owned(),
                    body: "Hand-written body".to_owned(),
                },
            )
            .await
            .expect("edit");

        assert_eq!(state, ApprovalState::Sent);
        let sent = delivery.sent.lock().expect("sent lock");
        assert_eq!(sent[0].subject_line, "Quick question");
        assert_eq!(sent[0].body, "Hand-written body");
        assert_eq!(sent[0].status, DraftStatus::Edited);
    }

    #[tokio::test]
    async fn delivery_failure_leaves_session_approved() {
        let delivery = RecordingDelivery { fail: true, ..RecordingDelivery::default() };
        let (controller, _) = controller(ScriptedGenerator::always_ok(), delivery);
        let mut session = session(3);

        draft_and_submit(&controller, &mut session).await;
        let error = controller
            .record_decision(&mut session, Decision::Approve)
            .await
            .expect_err("delivery failure is reported");

        assert_eq!(error.kind(), ErrorKind::Delivery);
        assert_eq!(session.state, ApprovalState::Approved);
        assert_eq!(
            session.current_draft.as_ref().map(|draft| draft.status),
            Some(DraftStatus::Approved)
        );
        assert!(session.delivery_id.is_none());
    }

    #[tokio::test]
    async fn decisions_before_submission_are_invalid_state() {
        let (controller, _) = controller(ScriptedGenerator::always_ok(), RecordingDelivery::default());
        let mut session = session(3);

        let error = controller
            .record_decision(&mut session, Decision::Reject { feedback: "x".to_owned() })
            .await
            .expect_err("nothing to reject yet");
        assert_eq!(error.kind(), ErrorKind::InvalidState);
        assert!(session.feedback_history.is_empty());
    }

    #[tokio::test]
    async fn abandon_closes_session_without_sending() {
        let delivery = RecordingDelivery::default();
        let (controller, _) = controller(ScriptedGenerator::always_ok(), delivery.clone());
        let mut session = session(3);

        draft_and_submit(&controller, &mut session).await;
        assert_eq!(controller.abandon(&mut session).expect("abandon"), ApprovalState::Abandoned);
        assert!(delivery.sent.lock().expect("sent lock").is_empty());
        assert!(controller.abandon(&mut session).is_err());
    }
}
