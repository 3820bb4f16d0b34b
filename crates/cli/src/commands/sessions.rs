use serde_json::json;

use crate::commands::{with_store, CommandResult};

pub fn run() -> CommandResult {
    with_store("sessions", |_, _, store| async move {
        let result = match store.list_sessions().await {
            Ok(ids) => CommandResult::success_with(
                "sessions",
                format!("{} session(s)", ids.len()),
                Some(json!({ "sessions": ids })),
            ),
            Err(error) => CommandResult::from_application_error("sessions", &error),
        };
        (store, result)
    })
}
