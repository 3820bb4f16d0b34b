pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod ports;

pub use approvals::{ApprovalController, ApprovalSession, ApprovalSessionId, Decision};
pub use domain::contact::{ContactRequest, ContactType, ResearchRequest, SenderProfile};
pub use domain::draft::{DraftContent, DraftStatus, OutreachDraft};
pub use domain::research::{FieldValue, ResearchResult};
pub use domain::session::{SessionId, SessionMemory, Turn};
pub use errors::{ApplicationError, DomainError, ErrorKind, InterfaceClass, InterfaceError};
pub use flows::ApprovalState;
pub use ports::{DeliveryChannel, DraftGenerator, Reasoner, Researcher};
