//! Interactive console approval loop: research, draft, review, regenerate, send.

use clap::Args;
use dialoguer::{Input, Select};
use outreach_agent::{LlmDraftGenerator, LlmResearcher, MockDeliveryChannel};
use outreach_core::approvals::{ApprovalController, ApprovalSession, Decision};
use outreach_core::audit::{AuditSink, TracingAuditSink};
use outreach_core::domain::contact::{ContactType, ResearchRequest, SenderProfile};
use outreach_core::domain::draft::OutreachDraft;
use outreach_core::domain::research::ResearchResult;
use outreach_core::domain::session::SessionId;
use outreach_core::errors::{ApplicationError, DomainError};
use outreach_core::flows::ApprovalState;
use outreach_core::ports::{DeliveryChannel, DraftGenerator, Researcher};
use outreach_db::SessionMemoryStore;

use crate::commands::{with_store, Agents, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct OutreachArgs {
    #[arg(long, help = "Contact or company name")]
    pub name: String,
    #[arg(long, help = "Recipient email address")]
    pub email: String,
    #[arg(long, default_value = "emaillist", help = "emaillist (individual) or company")]
    pub contact_type: String,
    #[arg(long, help = "Your name, used in the sign-off")]
    pub sender_name: Option<String>,
    #[arg(long, help = "Your career field (falls back to outreach.career_field)")]
    pub career_field: Option<String>,
    #[arg(long, help = "What you do (falls back to outreach.career_description)")]
    pub career_description: Option<String>,
    #[arg(long, allow_negative_numbers = true, help = "Override outreach.max_attempts")]
    pub max_attempts: Option<i32>,
    #[arg(long, help = "Reuse research stored under this session key (default lead:<name>)")]
    pub session: Option<String>,
}

/// What the reviewer chose for the draft on screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReviewChoice {
    Approve,
    Reject { feedback: String },
    Edit { subject_line: String, body: String },
    View,
    Quit,
}

pub trait Reviewer {
    fn review(&mut self, draft: &OutreachDraft, session: &ApprovalSession) -> ReviewChoice;
    fn notify(&mut self, message: &str);
}

/// Terminal reviewer. Interaction errors (closed stdin, no TTY) count as Quit.
pub struct ConsoleReviewer;

const OPTIONS: [&str; 5] = [
    "Approve and send",
    "Reject with feedback",
    "Edit and send",
    "View draft again",
    "Quit without sending",
];

impl ConsoleReviewer {
    fn print_draft(draft: &OutreachDraft) {
        eprintln!();
        eprintln!("To:      {} <{}>", draft.subject_name, draft.subject_email);
        eprintln!("Subject: {}", draft.subject_line);
        eprintln!("{}", "-".repeat(60));
        eprintln!("{}", draft.body);
        eprintln!("{}", "-".repeat(60));
    }

    fn prompt_text(prompt: &str, initial: Option<&str>) -> Option<String> {
        let mut input = Input::<String>::new().with_prompt(prompt).allow_empty(true);
        if let Some(initial) = initial {
            input = input.with_initial_text(initial);
        }
        match input.interact_text() {
            Ok(text) => Some(text),
            Err(error) => {
                tracing::warn!(
                    event_name = "cli.review_input_failed",
                    error = %error,
                    "input aborted"
                );
                None
            }
        }
    }
}

impl Reviewer for ConsoleReviewer {
    fn review(&mut self, draft: &OutreachDraft, _session: &ApprovalSession) -> ReviewChoice {
        Self::print_draft(draft);
        let choice = Select::new().with_prompt("Decision").items(&OPTIONS).default(0).interact();
        match choice {
            Ok(0) => ReviewChoice::Approve,
            Ok(1) => match Self::prompt_text("What should change", None) {
                Some(feedback) => ReviewChoice::Reject { feedback },
                None => ReviewChoice::Quit,
            },
            Ok(2) => {
                let subject = Self::prompt_text("Subject", Some(&draft.subject_line));
                let body =
                    subject.as_ref().and_then(|_| Self::prompt_text("Body", Some(&draft.body)));
                match (subject, body) {
                    (Some(subject_line), Some(body)) => ReviewChoice::Edit { subject_line, body },
                    _ => ReviewChoice::Quit,
                }
            }
            Ok(3) => ReviewChoice::View,
            Ok(_) => ReviewChoice::Quit,
            Err(error) => {
                tracing::warn!(
                    event_name = "cli.review_input_failed",
                    error = %error,
                    "selection aborted"
                );
                ReviewChoice::Quit
            }
        }
    }

    fn notify(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Drives one approval session to `Sent` or `Abandoned`.
///
/// Generation and delivery failures end the loop with the error; the session keeps the
/// state the controller left it in.
pub async fn run_approval_loop<G, D, S, R>(
    controller: &ApprovalController<G, D, S>,
    session: &mut ApprovalSession,
    research: &ResearchResult,
    reviewer: &mut R,
) -> Result<ApprovalState, ApplicationError>
where
    G: DraftGenerator,
    D: DeliveryChannel,
    S: AuditSink,
    R: Reviewer,
{
    let budget = session.flow_context().generation_budget();

    while !session.is_terminal() {
        match session.state {
            ApprovalState::Drafting => {
                let draft = controller.generate_draft(session, research, None).await?;
                reviewer.notify(&format!("Generation attempt {}/{budget}", draft.attempt_number));
                controller.submit_for_approval(session, draft)?;
            }
            ApprovalState::PendingApproval => {
                let draft = session.current_draft.clone().ok_or_else(|| {
                    DomainError::Inconsistent("pending session without a draft".to_string())
                })?;
                let decision = match reviewer.review(&draft, session) {
                    ReviewChoice::View => continue,
                    ReviewChoice::Quit => {
                        controller.abandon(session)?;
                        reviewer.notify("Outreach abandoned; nothing was sent.");
                        continue;
                    }
                    ReviewChoice::Approve => Decision::Approve,
                    ReviewChoice::Reject { feedback } => Decision::Reject { feedback },
                    ReviewChoice::Edit { subject_line, body } => {
                        Decision::Edit { subject_line, body }
                    }
                };

                match controller.record_decision(session, decision).await? {
                    ApprovalState::Drafting => reviewer.notify(&format!(
                        "Draft rejected. {} attempt(s) remaining.",
                        session.attempts_remaining()
                    )),
                    ApprovalState::Abandoned => reviewer
                        .notify("Maximum attempts reached without approval. Outreach abandoned."),
                    ApprovalState::Sent => reviewer.notify(&format!(
                        "Sent. Delivery id: {}",
                        session.delivery_id.as_deref().unwrap_or("<none>")
                    )),
                    _ => {}
                }
            }
            other => {
                return Err(DomainError::Inconsistent(format!(
                    "approval loop cannot continue from `{}`",
                    other.as_str()
                ))
                .into());
            }
        }
    }

    Ok(session.state)
}

/// Flags win, then the profile remembered for this lead, then the configured one.
fn resolve_sender(
    args: &OutreachArgs,
    remembered: Option<SenderProfile>,
    configured: Option<SenderProfile>,
) -> Result<SenderProfile, ApplicationError> {
    let configured = remembered.or(configured).unwrap_or_default();
    let career_field = args
        .career_field
        .clone()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(configured.career_field);
    if career_field.trim().is_empty() {
        return Err(DomainError::MissingFields { fields: vec!["career_field".to_string()] }.into());
    }
    Ok(SenderProfile {
        name: args.sender_name.clone().or(configured.name),
        career_field,
        career_description: args
            .career_description
            .clone()
            .unwrap_or(configured.career_description),
    })
}

async fn stored_or_fresh_research(
    store: &SessionMemoryStore,
    agents: &Agents,
    session_id: &SessionId,
    request: &ResearchRequest,
) -> Result<ResearchResult, ApplicationError> {
    if let Some(research) = store.inspect(session_id).await?.and_then(|memory| memory.research) {
        tracing::info!(
            event_name = "cli.research_reused",
            session_id = %session_id,
            "reusing stored research"
        );
        return Ok(research);
    }
    let researcher = LlmResearcher::new(agents.llm.clone(), agents.prompts.clone());
    let research = researcher.research(request).await?;
    store.store_research(session_id, research.clone()).await?;
    Ok(research)
}

pub fn run(args: OutreachArgs) -> CommandResult {
    let contact_type = match ContactType::parse(&args.contact_type) {
        Some(contact_type) => contact_type,
        None => {
            return CommandResult::failure(
                "outreach",
                "invalid_input",
                format!("contact_type must be emaillist or company, got `{}`", args.contact_type),
                7,
            )
        }
    };
    let session_key =
        args.session.clone().unwrap_or_else(|| SessionId::for_lead(&args.name).into_inner());
    let session_id = match SessionId::parse(&session_key) {
        Ok(id) => id,
        Err(error) => {
            return CommandResult::from_application_error("outreach", &ApplicationError::from(error))
        }
    };

    with_store("outreach", |config, agents, store| async move {
        let outcome = async {
            let remembered = store.sender(&session_id).await?;
            let sender = resolve_sender(&args, remembered, config.outreach.sender_profile())?;
            store.remember_sender(&session_id, &sender).await?;
            let mut request = ResearchRequest::for_subject(args.name.trim());
            request.subject_email = Some(args.email.clone());
            request.contact_type = contact_type;
            request.sender = Some(sender.clone());

            let research = stored_or_fresh_research(&store, &agents, &session_id, &request).await?;

            let generator = LlmDraftGenerator::new(agents.llm.clone(), agents.prompts.clone())
                .for_contact_type(contact_type);
            let controller =
                ApprovalController::new(generator, MockDeliveryChannel, TracingAuditSink)
                    .with_actor("cli");
            let max_attempts = args.max_attempts.unwrap_or(config.outreach.max_attempts);
            let mut session =
                controller.start(args.name.trim(), args.email.trim(), sender, max_attempts);

            let result =
                run_approval_loop(&controller, &mut session, &research, &mut ConsoleReviewer)
                    .await;
            Ok::<_, ApplicationError>((session, result))
        }
        .await;

        let result = match outcome {
            Ok((session, Ok(state))) => CommandResult::success_with(
                "outreach",
                format!("approval session finished in state `{}`", state.as_str()),
                serde_json::to_value(&session).ok(),
            ),
            Ok((_, Err(error))) | Err(error) => {
                CommandResult::from_application_error("outreach", &error)
            }
        };
        (store, result)
    })
}
