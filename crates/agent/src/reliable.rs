use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};

/// Wraps any client with a bounded retry policy: `max_attempts` tries, a fixed delay between
/// them, and an early exit on errors that cannot succeed on retry.
pub struct RetryingLlmClient {
    inner: Box<dyn LlmClient>,
    max_attempts: u32,
    delay: Duration,
}

impl RetryingLlmClient {
    pub fn new(inner: Box<dyn LlmClient>, max_attempts: u32, delay: Duration) -> Self {
        Self { inner, max_attempts: max_attempts.max(1), delay }
    }
}

fn is_non_retryable(error: &anyhow::Error) -> bool {
    error.downcast_ref::<LlmError>().is_some_and(|error| !error.is_retryable())
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.inner.complete(system, prompt).await {
                Ok(text) => {
                    if attempt > 1 {
                        tracing::info!(
                            event_name = "llm.recovered",
                            attempt,
                            "model call succeeded after retries"
                        );
                    }
                    return Ok(text);
                }
                Err(error) if attempt >= self.max_attempts || is_non_retryable(&error) => {
                    tracing::warn!(
                        event_name = "llm.failed",
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "model call failed"
                    );
                    return Err(error);
                }
                Err(error) => {
                    tracing::warn!(
                        event_name = "llm.retrying",
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "model call failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
