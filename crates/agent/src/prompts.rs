use outreach_core::domain::contact::{ContactType, ResearchRequest, SenderProfile};
use outreach_core::domain::research::ResearchResult;
use outreach_core::domain::session::Turn;
use serde::Serialize;
use tera::{Context, Tera};

const TEMPLATES: [(&str, &str); 6] = [
    ("research_system.txt", include_str!("../templates/research_system.txt")),
    ("research.txt", include_str!("../templates/research.txt")),
    ("draft_system.txt", include_str!("../templates/draft_system.txt")),
    ("draft.txt", include_str!("../templates/draft.txt")),
    ("answer_system.txt", include_str!("../templates/answer_system.txt")),
    ("answer.txt", include_str!("../templates/answer.txt")),
];

/// A rendered system/user prompt pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Serialize)]
struct Line<'a> {
    label: String,
    value: &'a str,
}

#[derive(Serialize)]
struct RenderedField {
    label: String,
    value: String,
}

/// Embedded tera templates for every model call the agents make.
pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;
        Ok(Self { tera })
    }

    pub fn research(&self, request: &ResearchRequest) -> Result<Prompt, tera::Error> {
        let readable = request.readable_context();
        let context_lines: Vec<Line<'_>> = readable
            .iter()
            .map(|(label, value)| Line { label: label.clone(), value: value.as_str() })
            .collect();

        let mut context = Context::new();
        context.insert("subject_name", &request.subject_name);
        context.insert("subject_email", &request.subject_email);
        context.insert("subject_description", request.contact_type.subject_description());
        context.insert("contact_type", request.contact_type.as_str());
        context.insert("context", &context_lines);
        context.insert("sender", &request.sender);

        self.render("research", &context)
    }

    pub fn draft(
        &self,
        research: &ResearchResult,
        sender: &SenderProfile,
        contact_type: ContactType,
        feedback: &[String],
    ) -> Result<Prompt, tera::Error> {
        let feedback: Vec<&str> =
            feedback.iter().map(|note| note.trim()).filter(|note| !note.is_empty()).collect();

        let mut context = Context::new();
        context.insert("subject_name", research.subject_name());
        context.insert("subject_description", contact_type.subject_description());
        context.insert("contact_type", contact_type.as_str());
        context.insert("narrative", research.narrative());
        context.insert("fields", &rendered_fields(research));
        context.insert("sender", sender);
        context.insert("feedback", &feedback);

        self.render("draft", &context)
    }

    pub fn answer(
        &self,
        research: &ResearchResult,
        history: &[Turn],
        question: &str,
    ) -> Result<Prompt, tera::Error> {
        let mut context = Context::new();
        context.insert("subject_name", research.subject_name());
        context.insert("narrative", research.narrative());
        context.insert("fields", &rendered_fields(research));
        context.insert("history", history);
        context.insert("question", question.trim());

        self.render("answer", &context)
    }

    fn render(&self, name: &str, context: &Context) -> Result<Prompt, tera::Error> {
        Ok(Prompt {
            system: self.tera.render(&format!("{name}_system.txt"), context)?.trim().to_string(),
            user: self.tera.render(&format!("{name}.txt"), context)?.trim().to_string(),
        })
    }
}

fn rendered_fields(research: &ResearchResult) -> Vec<RenderedField> {
    research
        .structured_fields()
        .iter()
        .map(|(key, value)| RenderedField {
            label: outreach_core::domain::contact::readable_key(key),
            value: value.render(),
        })
        .collect()
}
