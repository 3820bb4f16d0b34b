use outreach_core::domain::session::SessionId;
use outreach_core::errors::ApplicationError;
use serde_json::json;

use crate::commands::{with_store, CommandResult};

pub fn run(session: &str, question: &str) -> CommandResult {
    let session_id = match SessionId::parse(session) {
        Ok(id) => id,
        Err(error) => {
            return CommandResult::from_application_error("ask", &ApplicationError::from(error))
        }
    };
    let question = question.to_string();

    with_store("ask", |_, _, store| async move {
        let result = match store.answer_question(&session_id, &question).await {
            Ok(answer) => CommandResult::success_with(
                "ask",
                answer.clone(),
                Some(json!({ "session_id": session_id, "question": question, "answer": answer })),
            ),
            Err(error) => CommandResult::from_application_error("ask", &error),
        };
        (store, result)
    })
}
