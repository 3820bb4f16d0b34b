use std::sync::Arc;

use async_trait::async_trait;
use outreach_core::domain::contact::{ContactType, SenderProfile};
use outreach_core::domain::draft::DraftContent;
use outreach_core::domain::research::ResearchResult;
use outreach_core::errors::ApplicationError;
use outreach_core::ports::DraftGenerator;

use crate::llm::LlmClient;
use crate::prompts::PromptLibrary;

pub struct LlmDraftGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    contact_type: ContactType,
}

impl LlmDraftGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts, contact_type: ContactType::default() }
    }

    /// Company contacts get organization-level wording instead of a personal greeting.
    pub fn for_contact_type(mut self, contact_type: ContactType) -> Self {
        self.contact_type = contact_type;
        self
    }
}

#[async_trait]
impl DraftGenerator for LlmDraftGenerator {
    async fn generate(
        &self,
        research: &ResearchResult,
        sender: &SenderProfile,
        feedback: &[String],
    ) -> Result<DraftContent, ApplicationError> {
        let prompt = self
            .prompts
            .draft(research, sender, self.contact_type, feedback)
            .map_err(|error| ApplicationError::Generation(format!("prompt: {error}")))?;

        let response = self
            .llm
            .complete(&prompt.system, &prompt.user)
            .await
            .map_err(|error| ApplicationError::Generation(error.to_string()))?;

        let content = parse_draft(&response).map_err(ApplicationError::Generation)?;
        tracing::debug!(
            event_name = "draft.generated",
            subject = %research.subject_name(),
            feedback_notes = feedback.len(),
            body_chars = content.body.chars().count(),
            "draft generated"
        );
        Ok(content)
    }
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.trim_start_matches(['*', '#', ' '])
        .strip_prefix(label)
        .map(|rest| rest.trim_start_matches('*'))
}

/// Parses the `SUBJECT: ...` / `BODY:` reply format. The body may start on the `BODY:` line
/// itself or on the lines after it.
pub fn parse_draft(response: &str) -> Result<DraftContent, String> {
    let lines: Vec<&str> = response.lines().collect();

    let (subject_index, subject) = lines
        .iter()
        .enumerate()
        .find_map(|(index, line)| strip_label(line, "SUBJECT:").map(|rest| (index, rest.trim())))
        .ok_or_else(|| "draft reply has no SUBJECT: line".to_string())?;
    if subject.is_empty() {
        return Err("draft reply has an empty subject line".to_string());
    }

    let (body_index, first_line) = lines
        .iter()
        .enumerate()
        .skip(subject_index + 1)
        .find_map(|(index, line)| strip_label(line, "BODY:").map(|rest| (index, rest.trim())))
        .ok_or_else(|| "draft reply has no BODY: section".to_string())?;

    let mut body_lines = Vec::with_capacity(lines.len() - body_index);
    if !first_line.is_empty() {
        body_lines.push(first_line);
    }
    body_lines.extend(lines[body_index + 1..].iter().copied());
    let body = body_lines.join("\n").trim().to_string();
    if body.is_empty() {
        return Err("draft reply has an empty body".to_string());
    }

    Ok(DraftContent::new(subject, body))
}
