//! LLM-backed collaborators for the outreach workflow.
//!
//! Everything here sits behind the ports declared in `outreach-core`:
//! - `research` turns a subject into a normalised `ResearchResult`
//! - `drafting` writes `SUBJECT:`/`BODY:` drafts grounded in research and reviewer feedback
//! - `reasoning` answers follow-up questions from stored research and prior turns
//! - `delivery` hands approved drafts to a (mock) sending channel
//!
//! The model itself is reached through [`llm::LlmClient`]; `gemini` and `ollama` are the
//! concrete HTTP clients and `reliable` adds the retry policy on top of either.
//!
//! The model never decides workflow state. Approval, regeneration and abandonment are
//! decided by the core controller; this crate only produces text.

pub mod delivery;
pub mod drafting;
pub mod gemini;
pub mod llm;
pub mod ollama;
pub mod prompts;
pub mod reasoning;
pub mod reliable;
pub mod research;

pub use delivery::MockDeliveryChannel;
pub use drafting::LlmDraftGenerator;
pub use llm::{build_client, LlmClient, LlmError};
pub use reasoning::LlmReasoner;
pub use reliable::RetryingLlmClient;
pub use research::LlmResearcher;
