use outreach_core::domain::session::SessionId;
use outreach_core::errors::ApplicationError;

use crate::commands::{with_store, CommandResult};

pub fn run(session: &str) -> CommandResult {
    let session_id = match SessionId::parse(session) {
        Ok(id) => id,
        Err(error) => {
            return CommandResult::from_application_error("inspect", &ApplicationError::from(error))
        }
    };

    with_store("inspect", |_, _, store| async move {
        let result = match store.inspect(&session_id).await {
            Ok(Some(memory)) => CommandResult::success_with(
                "inspect",
                format!(
                    "session `{session_id}`: research {}, {} turn(s)",
                    if memory.has_research() { "stored" } else { "missing" },
                    memory.turn_history.len()
                ),
                serde_json::to_value(&memory).ok(),
            ),
            Ok(None) => CommandResult::failure(
                "inspect",
                "not_found",
                format!("no session `{session_id}`"),
                7,
            ),
            Err(error) => CommandResult::from_application_error("inspect", &error),
        };
        (store, result)
    })
}
