use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::llm::{http_client, status_error, LlmClient, LlmError};

const PROVIDER: &str = "gemini";

/// Gemini `generateContent` client, optionally grounded with Google Search.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: SecretString,
    search_grounding: bool,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Default, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: SecretString,
        search_grounding: bool,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
            api_key,
            search_grounding,
            client: http_client(timeout_secs)?,
        })
    }

    fn build_request(&self, system: &str, prompt: &str) -> GenerateContentRequest {
        let system_instruction = (!system.trim().is_empty()).then(|| Content {
            role: None,
            parts: vec![Part { text: system.to_string() }],
        });
        let tools = if self.search_grounding {
            vec![Tool { google_search: GoogleSearch::default() }]
        } else {
            Vec::new()
        };

        GenerateContentRequest {
            system_instruction,
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt.to_string() }],
            }],
            tools,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Joins the text parts of the first candidate; grounded answers arrive split across parts.
fn extract_text(response: &GenerateContentResponse) -> Option<String> {
    let text = response
        .candidates
        .first()?
        .content
        .as_ref()?
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = self.build_request(system, prompt);
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(LlmError::from)?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, response).await.into());
        }

        let body: GenerateContentResponse = response.json().await.map_err(LlmError::from)?;
        extract_text(&body).ok_or_else(|| LlmError::EmptyResponse { provider: PROVIDER }.into())
    }
}
