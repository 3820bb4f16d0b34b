//! Seams to the external collaborators: research, drafting, delivery and reasoning.
//!
//! Every method reports failures with the [`ApplicationError`] variant of its concern
//! (`ResearchUnavailable`, `Generation`, `Delivery`); callers surface them unchanged.

use async_trait::async_trait;

use crate::domain::contact::{ResearchRequest, SenderProfile};
use crate::domain::draft::{DraftContent, OutreachDraft};
use crate::domain::research::ResearchResult;
use crate::domain::session::Turn;
use crate::errors::ApplicationError;

#[async_trait]
pub trait Researcher: Send + Sync {
    async fn research(&self, request: &ResearchRequest) -> Result<ResearchResult, ApplicationError>;
}

#[async_trait]
pub trait DraftGenerator: Send + Sync {
    /// `feedback` holds every non-empty rejection note so far, oldest first.
    async fn generate(
        &self,
        research: &ResearchResult,
        sender: &SenderProfile,
        feedback: &[String],
    ) -> Result<DraftContent, ApplicationError>;
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Returns the delivery identifier assigned by the channel.
    async fn send(&self, draft: &OutreachDraft) -> Result<String, ApplicationError>;
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn answer(
        &self,
        research: &ResearchResult,
        history: &[Turn],
        question: &str,
    ) -> Result<String, ApplicationError>;
}
