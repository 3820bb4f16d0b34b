use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use outreach_core::config::{LlmConfig, LlmProvider};
use outreach_core::errors::ApplicationError;

use crate::gemini::GeminiClient;
use crate::ollama::OllamaClient;
use crate::reliable::RetryingLlmClient;

/// A single-shot text completion against some model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{provider} returned HTTP {status}: {message}")]
    Status { provider: &'static str, status: u16, message: String },
    #[error("{provider} returned no text")]
    EmptyResponse { provider: &'static str },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl LlmError {
    /// Client errors will not resolve on retry, except request timeouts and rate limits.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            Self::EmptyResponse { .. } | Self::Transport(_) => true,
        }
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(LlmError::from)
}

/// Reads the error body without letting a broken body hide the status code.
pub(crate) async fn status_error(provider: &'static str, response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    let message = message.chars().take(500).collect::<String>();
    LlmError::Status { provider, status, message }
}

/// Builds the configured provider client wrapped in the retry policy.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, ApplicationError> {
    let to_config_error =
        |error: LlmError| ApplicationError::Configuration(format!("llm client: {error}"));

    let inner: Box<dyn LlmClient> = match config.provider {
        LlmProvider::Gemini => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ApplicationError::Configuration(
                    "llm.api_key (or GOOGLE_API_KEY) is required for the gemini provider"
                        .to_string(),
                )
            })?;
            Box::new(
                GeminiClient::new(
                    config.effective_base_url(),
                    &config.model,
                    api_key,
                    config.search_grounding,
                    config.timeout_secs,
                )
                .map_err(to_config_error)?,
            )
        }
        LlmProvider::Ollama => Box::new(
            OllamaClient::new(config.effective_base_url(), &config.model, config.timeout_secs)
                .map_err(to_config_error)?,
        ),
    };

    tracing::info!(
        event_name = "llm.client_built",
        provider = config.provider.as_str(),
        model = %config.model,
        max_retries = config.max_retries,
        "llm client ready"
    );

    Ok(Arc::new(RetryingLlmClient::new(
        inner,
        config.max_retries,
        Duration::from_millis(config.retry_delay_ms),
    )))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::LlmClient;

    /// Replays scripted responses and records every prompt it was given.
    #[derive(Default)]
    pub struct CannedLlm {
        responses: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl CannedLlm {
        pub fn new(responses: Vec<Result<String>>) -> Self {
            Self { responses: Mutex::new(responses.into()), prompts: Mutex::new(Vec::new()) }
        }

        pub fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_owned())])
        }

        pub fn prompts(&self) -> Vec<(String, String)> {
            self.prompts.lock().expect("prompt log").clone()
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
            self.prompts.lock().expect("prompt log").push((system.to_owned(), prompt.to_owned()));
            self.responses
                .lock()
                .expect("responses")
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response left")))
        }
    }
}
