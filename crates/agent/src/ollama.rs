use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::{http_client, status_error, LlmClient, LlmError};

const PROVIDER: &str = "ollama";

/// Local Ollama `/api/chat` client. No search grounding is available here, so research
/// quality depends on what the local model already knows.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: http_client(timeout_secs)?,
        })
    }

    fn build_request(&self, system: &str, prompt: &str) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if !system.trim().is_empty() {
            messages.push(Message { role: "system", content: system.to_string() });
        }
        messages.push(Message { role: "user", content: prompt.to_string() });

        ChatRequest { model: self.model.clone(), messages, stream: false }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = self.build_request(system, prompt);
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(LlmError::from)?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, response).await.into());
        }

        let body: ChatResponse = response.json().await.map_err(LlmError::from)?;
        body.message
            .map(|message| message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::EmptyResponse { provider: PROVIDER }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::OllamaClient;

    #[test]
    fn chat_request_puts_system_before_user_and_disables_streaming() {
        let client = OllamaClient::new("http://localhost:11434/", "llama3.1", 30).expect("client");
        let value =
            serde_json::to_value(client.build_request("system text", "user text")).expect("json");

        assert_eq!(value["model"], "llama3.1");
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "user text");
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
