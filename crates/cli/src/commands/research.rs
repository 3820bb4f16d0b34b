use std::collections::BTreeMap;

use clap::Args;
use outreach_agent::LlmResearcher;
use outreach_core::domain::contact::{ContactType, ResearchRequest};
use outreach_core::domain::session::SessionId;
use outreach_core::errors::{ApplicationError, DomainError};
use outreach_core::ports::Researcher;

use crate::commands::{with_store, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct ResearchArgs {
    /// Session key the findings are stored under, e.g. `lead:jane doe`.
    pub session: String,
    #[arg(long, help = "Name of the person or company to research")]
    pub name: String,
    #[arg(long, help = "Contact email, used only as a research hint")]
    pub email: Option<String>,
    #[arg(long, default_value = "emaillist", help = "emaillist (individual) or company")]
    pub contact_type: String,
    #[arg(long = "context", value_parser = parse_context_entry, help = "Extra context as key=value")]
    pub context: Vec<(String, String)>,
}

fn parse_context_entry(raw: &str) -> Result<(String, String), String> {
    let (key, value) =
        raw.split_once('=').ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("context key must not be empty".to_string());
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn build_request(args: &ResearchArgs) -> Result<(SessionId, ResearchRequest), ApplicationError> {
    let session_id = SessionId::parse(&args.session)?;
    let contact_type = ContactType::parse(&args.contact_type).ok_or_else(|| {
        DomainError::InvalidField {
            field: "contact_type".to_string(),
            reason: format!("expected emaillist or company, got `{}`", args.contact_type),
        }
    })?;
    if args.name.trim().is_empty() {
        return Err(DomainError::MissingFields { fields: vec!["name".to_string()] }.into());
    }

    let mut request = ResearchRequest::for_subject(args.name.trim());
    request.subject_email = args.email.clone().filter(|email| !email.trim().is_empty());
    request.contact_type = contact_type;
    request.context = args
        .context
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .cloned()
        .collect::<BTreeMap<_, _>>();
    Ok((session_id, request))
}

pub fn run(args: ResearchArgs) -> CommandResult {
    let (session_id, mut request) = match build_request(&args) {
        Ok(parsed) => parsed,
        Err(error) => return CommandResult::from_application_error("research", &error),
    };

    with_store("research", |config, agents, store| async move {
        request.sender = config.outreach.sender_profile();
        let researcher = LlmResearcher::new(agents.llm.clone(), agents.prompts.clone());

        let outcome = async {
            let research = researcher.research(&request).await?;
            store.store_research(&session_id, research.clone()).await?;
            Ok::<_, ApplicationError>(research)
        }
        .await;

        let result = match outcome {
            Ok(research) => CommandResult::success_with(
                "research",
                format!(
                    "stored research for `{}` in session `{session_id}`",
                    research.subject_name()
                ),
                serde_json::to_value(&research).ok(),
            ),
            Err(error) => CommandResult::from_application_error("research", &error),
        };
        (store, result)
    })
}
