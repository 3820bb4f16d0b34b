use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use outreach_core::domain::contact::ResearchRequest;
use outreach_core::domain::research::{FieldValue, ResearchResult};
use outreach_core::errors::ApplicationError;
use outreach_core::ports::Researcher;
use serde_json::{Map, Value};

use crate::llm::LlmClient;
use crate::prompts::PromptLibrary;

/// Values models emit when they found nothing; never stored as research.
const PLACEHOLDERS: &[&str] = &[
    "unknown",
    "n/a",
    "not found",
    "not available",
    "research incomplete",
    "based on research",
    "research available",
    "see research summary",
    "research completed",
    "not specified",
    "url or description",
    "description",
];

const NARRATIVE_KEYS: &[&str] =
    &["notable_connections", "narrative", "summary", "research_summary"];
const IDENTITY_KEYS: &[&str] = &["name", "current_role", "company"];
const SECTION_MARKERS: &[&str] = &["RESEARCH_DATA:", "RESEARCH:"];
const SECTION_TERMINATORS: &[&str] = &["EMAIL_JSON:", "EMAIL:", "---", "\n\n"];
const MIN_NARRATIVE_CHARS: usize = 50;

pub struct LlmResearcher {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
}

impl LlmResearcher {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl Researcher for LlmResearcher {
    async fn research(
        &self,
        request: &ResearchRequest,
    ) -> Result<ResearchResult, ApplicationError> {
        let prompt = self
            .prompts
            .research(request)
            .map_err(|error| ApplicationError::ResearchUnavailable(format!("prompt: {error}")))?;

        let response = self.llm.complete(&prompt.system, &prompt.user).await.map_err(|error| {
            tracing::warn!(
                event_name = "research.unavailable",
                subject = %request.subject_name,
                error = %error,
                "research model call failed"
            );
            ApplicationError::ResearchUnavailable(error.to_string())
        })?;

        let result = parse_research(&request.subject_name, &response)
            .map_err(ApplicationError::ResearchUnavailable)?;

        tracing::info!(
            event_name = "research.completed",
            subject = %request.subject_name,
            fields = result.structured_fields().len(),
            narrative_chars = result.narrative().chars().count(),
            "research completed"
        );
        Ok(result)
    }
}

/// Accepts a JSON object of fields, a `RESEARCH_DATA:`/`RESEARCH:` section, or substantial
/// plain text, and rejects results with no usable content.
pub fn parse_research(subject_name: &str, response: &str) -> Result<ResearchResult, String> {
    let trimmed = strip_code_fence(response.trim());

    let (narrative, fields) = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(object)) => match object.get("research_data").and_then(Value::as_str) {
            Some(text) => (text.trim().to_string(), BTreeMap::new()),
            None => normalize_object(&object),
        },
        _ => (text_section(trimmed)?, BTreeMap::new()),
    };

    let result =
        ResearchResult::new(subject_name, narrative, fields).map_err(|error| error.to_string())?;
    if is_usable(&result) {
        Ok(result)
    } else {
        Err(format!("research for `{subject_name}` returned no usable findings"))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn text_section(text: &str) -> Result<String, String> {
    for marker in SECTION_MARKERS {
        if let Some(start) = text.find(marker) {
            let rest = &text[start + marker.len()..];
            let end = SECTION_TERMINATORS
                .iter()
                .filter_map(|terminator| rest.find(terminator))
                .min()
                .unwrap_or(rest.len());
            let section = rest[..end].trim();
            if !section.is_empty() {
                return Ok(section.to_string());
            }
        }
    }

    if text.chars().count() > MIN_NARRATIVE_CHARS {
        Ok(text.to_string())
    } else {
        Err(format!("response too short to be research ({} chars)", text.chars().count()))
    }
}

fn normalize_object(object: &Map<String, Value>) -> (String, BTreeMap<String, FieldValue>) {
    let mut narrative = String::new();
    let mut fields = BTreeMap::new();

    for (key, value) in object {
        if NARRATIVE_KEYS.contains(&key.as_str()) {
            if narrative.is_empty() {
                narrative = value.as_str().map(str::trim).unwrap_or_default().to_string();
            }
            continue;
        }
        if key == "social_media" {
            fields.extend(social_links(value));
            continue;
        }
        if let Some(value) = field_value(value) {
            fields.insert(key.clone(), value);
        }
    }

    (narrative, fields)
}

fn field_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().filter_map(scalar_text).collect();
            (!items.is_empty()).then_some(FieldValue::List(items))
        }
        other => scalar_text(other).map(FieldValue::Text),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!is_placeholder(&text)).then_some(text)
}

/// Keeps only `http(s)` profile links, keyed by platform.
fn social_links(value: &Value) -> BTreeMap<String, FieldValue> {
    let Some(object) = value.as_object() else {
        return BTreeMap::new();
    };
    object
        .iter()
        .filter_map(|(platform, url)| {
            let url = url.as_str()?.trim();
            (url.starts_with("http://") || url.starts_with("https://"))
                .then(|| (platform.to_ascii_lowercase(), FieldValue::Text(url.to_string())))
        })
        .collect()
}

fn is_placeholder(text: &str) -> bool {
    text.is_empty() || PLACEHOLDERS.iter().any(|placeholder| text.eq_ignore_ascii_case(placeholder))
}

fn is_usable(result: &ResearchResult) -> bool {
    IDENTITY_KEYS.iter().any(|key| result.text_field(key).is_some())
        || result.narrative().chars().count() > MIN_NARRATIVE_CHARS
}
