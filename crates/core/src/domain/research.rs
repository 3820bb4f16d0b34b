use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Sentinel the research collaborator uses for fields it could not fill.
pub const NOT_SPECIFIED: &str = "Not specified";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Trims the value and drops sentinel entries; `None` when nothing remains.
    pub fn sanitized(self) -> Option<Self> {
        match self {
            Self::Text(text) => {
                let text = text.trim();
                (!is_unspecified(text)).then(|| Self::Text(text.to_owned()))
            }
            Self::List(items) => {
                let items: Vec<String> = items
                    .into_iter()
                    .map(|item| item.trim().to_owned())
                    .filter(|item| !is_unspecified(item))
                    .collect();
                (!items.is_empty()).then_some(Self::List(items))
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::List(_) => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => items.join("; "),
        }
    }
}

fn is_unspecified(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case(NOT_SPECIFIED)
}

/// Research findings for one subject.
///
/// Construction goes through [`ResearchResult::new`] so stored results never carry
/// sentinel or empty fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResearchResult {
    subject_name: String,
    narrative: String,
    structured_fields: BTreeMap<String, FieldValue>,
}

impl ResearchResult {
    pub fn new(
        subject_name: impl Into<String>,
        narrative: impl Into<String>,
        structured_fields: BTreeMap<String, FieldValue>,
    ) -> Result<Self, DomainError> {
        let subject_name = subject_name.into().trim().to_owned();
        if subject_name.is_empty() {
            return Err(DomainError::InvalidField {
                field: "subject_name".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        let structured_fields = structured_fields
            .into_iter()
            .filter_map(|(key, value)| {
                let key = key.trim().to_owned();
                if key.is_empty() {
                    return None;
                }
                value.sanitized().map(|value| (key, value))
            })
            .collect();

        Ok(Self { subject_name, narrative: narrative.into().trim().to_owned(), structured_fields })
    }

    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    pub fn structured_fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.structured_fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.structured_fields.get(key)
    }

    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(FieldValue::as_text)
    }
}
