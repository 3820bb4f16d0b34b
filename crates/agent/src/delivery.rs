use async_trait::async_trait;
use outreach_core::domain::draft::OutreachDraft;
use outreach_core::errors::ApplicationError;
use outreach_core::ports::DeliveryChannel;
use uuid::Uuid;

/// Stand-in sender: logs the message and hands back a `MSG-XXXXXXXX` id. Nothing leaves
/// the process.
#[derive(Clone, Debug, Default)]
pub struct MockDeliveryChannel;

pub fn message_id() -> String {
    let prefix = (Uuid::new_v4().as_u128() >> 96) as u32;
    format!("MSG-{prefix:08X}")
}

#[async_trait]
impl DeliveryChannel for MockDeliveryChannel {
    async fn send(&self, draft: &OutreachDraft) -> Result<String, ApplicationError> {
        let delivery_id = message_id();
        tracing::info!(
            event_name = "delivery.sent",
            delivery_id = %delivery_id,
            recipient = %draft.subject_email,
            subject_line = %draft.subject_line,
            attempt = draft.attempt_number,
            "mock delivery accepted message"
        );
        Ok(delivery_id)
    }
}
