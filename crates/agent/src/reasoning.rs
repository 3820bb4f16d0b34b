use std::sync::Arc;

use async_trait::async_trait;
use outreach_core::domain::research::ResearchResult;
use outreach_core::domain::session::Turn;
use outreach_core::errors::ApplicationError;
use outreach_core::ports::Reasoner;

use crate::llm::LlmClient;
use crate::prompts::PromptLibrary;

/// Answers follow-up questions from stored research plus the full turn history.
pub struct LlmReasoner {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
}

impl LlmReasoner {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn answer(
        &self,
        research: &ResearchResult,
        history: &[Turn],
        question: &str,
    ) -> Result<String, ApplicationError> {
        let prompt = self
            .prompts
            .answer(research, history, question)
            .map_err(|error| ApplicationError::Generation(format!("prompt: {error}")))?;

        self.llm
            .complete(&prompt.system, &prompt.user)
            .await
            .map(|answer| answer.trim().to_string())
            .map_err(|error| ApplicationError::Generation(error.to_string()))
    }
}
