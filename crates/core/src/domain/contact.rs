use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::research::NOT_SPECIFIED;
use crate::errors::DomainError;

pub const REQUIRED_FIELDS: [&str; 4] =
    ["contact_name", "contact_email", "career_field", "career_description"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    #[default]
    EmailList,
    Company,
}

impl ContactType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "emaillist" => Some(Self::EmailList),
            "company" => Some(Self::Company),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmailList => "emaillist",
            Self::Company => "company",
        }
    }

    pub fn subject_description(self) -> &'static str {
        match self {
            Self::EmailList => "individual professional",
            Self::Company => "company/organization",
        }
    }
}

/// Who the outreach is written on behalf of.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub name: Option<String>,
    pub career_field: String,
    pub career_description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub subject_name: String,
    pub subject_email: Option<String>,
    pub contact_type: ContactType,
    pub context: BTreeMap<String, String>,
    pub sender: Option<SenderProfile>,
}

impl ResearchRequest {
    pub fn for_subject(subject_name: impl Into<String>) -> Self {
        Self {
            subject_name: subject_name.into(),
            subject_email: None,
            contact_type: ContactType::default(),
            context: BTreeMap::new(),
            sender: None,
        }
    }

    /// Context entries with keys rendered for a prompt (`recent_project` -> `Recent Project`).
    pub fn readable_context(&self) -> Vec<(String, String)> {
        self.context.iter().map(|(key, value)| (readable_key(key), value.clone())).collect()
    }
}

/// Inbound outreach request as accepted over HTTP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContactRequest {
    pub contact_name: String,
    pub contact_email: String,
    pub career_field: String,
    pub career_description: String,
    pub contact_type: ContactType,
    pub contact_context: BTreeMap<String, String>,
}

impl ContactRequest {
    pub fn from_json(value: &Value) -> Result<Self, DomainError> {
        let Some(object) = value.as_object() else {
            return Err(DomainError::InvalidField {
                field: "body".to_owned(),
                reason: "expected a JSON object".to_owned(),
            });
        };

        let required = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|key| required(*key).is_none())
            .map(str::to_owned)
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::MissingFields { fields: missing });
        }

        let contact_type = match object.get("contact_type") {
            None | Some(Value::Null) => ContactType::default(),
            Some(Value::String(raw)) => {
                ContactType::parse(raw).ok_or_else(|| DomainError::InvalidField {
                    field: "contact_type".to_owned(),
                    reason: format!("`{raw}` is not one of emaillist|company"),
                })?
            }
            Some(_) => {
                return Err(DomainError::InvalidField {
                    field: "contact_type".to_owned(),
                    reason: "expected a string".to_owned(),
                })
            }
        };

        let contact_context = match object.get("contact_context") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(entries)) => entries
                .iter()
                .filter_map(|(key, value)| context_value(value).map(|value| (key.clone(), value)))
                .collect(),
            Some(_) => {
                return Err(DomainError::InvalidField {
                    field: "contact_context".to_owned(),
                    reason: "expected an object".to_owned(),
                })
            }
        };

        Ok(Self {
            contact_name: required("contact_name").unwrap_or_default(),
            contact_email: required("contact_email").unwrap_or_default(),
            career_field: required("career_field").unwrap_or_default(),
            career_description: required("career_description").unwrap_or_default(),
            contact_type,
            contact_context,
        })
    }

    pub fn sender_profile(&self) -> SenderProfile {
        SenderProfile {
            name: None,
            career_field: self.career_field.clone(),
            career_description: self.career_description.clone(),
        }
    }

    pub fn research_request(&self) -> ResearchRequest {
        ResearchRequest {
            subject_name: self.contact_name.clone(),
            subject_email: Some(self.contact_email.clone()),
            contact_type: self.contact_type,
            context: self.contact_context.clone(),
            sender: Some(self.sender_profile()),
        }
    }
}

fn context_value(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::Null => return None,
        Value::String(text) => text.trim().to_owned(),
        Value::Array(_) | Value::Object(_) => return None,
        scalar => scalar.to_string(),
    };
    (!rendered.is_empty() && rendered != NOT_SPECIFIED).then_some(rendered)
}

pub fn readable_key(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
