use serde_json::json;

use crate::commands::{with_store, CommandResult};

pub fn run(query: &str) -> CommandResult {
    let query = query.to_owned();
    with_store("search", |_, _, store| async move {
        let result = match store.search(&query).await {
            Ok(hits) => CommandResult::success_with(
                "search",
                format!("{} session(s) mention `{}`", hits.len(), query.trim()),
                Some(json!({ "query": query.trim(), "hits": hits })),
            ),
            Err(error) => CommandResult::from_application_error("search", &error),
        };
        (store, result)
    })
}
