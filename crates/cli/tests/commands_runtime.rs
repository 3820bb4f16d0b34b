use std::env;
use std::sync::{Mutex, PoisonError};

use std::collections::BTreeMap;

use outreach_cli::commands::{ask, config, doctor, inspect, migrate, research, search, sessions};
use outreach_core::domain::research::ResearchResult;
use outreach_core::domain::session::{SessionId, Turn};
use outreach_db::{connect_with_settings, migrations, SessionRepository, SqlSessionRepository};
use serde_json::Value;
use tempfile::TempDir;

const API_KEY: (&str, &str) = ("OUTREACH_LLM_API_KEY", "AIzaTestKeyForCommands");

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[API_KEY, ("OUTREACH_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_api_key() {
    with_env(&[("OUTREACH_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn sessions_lists_nothing_on_a_fresh_database() {
    let dir = TempDir::new().expect("temp dir");
    let url = file_url(&dir);
    with_env(&[API_KEY, ("OUTREACH_DATABASE_URL", url.as_str())], || {
        let result = sessions::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["sessions"], serde_json::json!([]));
    });
}

#[test]
fn ask_before_research_reports_no_research() {
    let dir = TempDir::new().expect("temp dir");
    let url = file_url(&dir);
    with_env(&[API_KEY, ("OUTREACH_DATABASE_URL", url.as_str())], || {
        let result = ask::run("lead:jane", "What company?");
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["error_class"], "no_research");

        // A rejected question leaves no session behind.
        let listed = parse_payload(&sessions::run().output);
        assert_eq!(listed["data"]["sessions"], serde_json::json!([]));
    });
}

#[test]
fn inspect_unknown_session_is_not_found() {
    let dir = TempDir::new().expect("temp dir");
    let url = file_url(&dir);
    with_env(&[API_KEY, ("OUTREACH_DATABASE_URL", url.as_str())], || {
        let result = inspect::run("lead:nobody");
        assert_eq!(result.exit_code, 7);
        assert_eq!(parse_payload(&result.output)["error_class"], "not_found");
    });
}

#[test]
fn research_with_unreachable_model_is_research_unavailable() {
    let dir = TempDir::new().expect("temp dir");
    let url = file_url(&dir);
    with_env(
        &[
            ("OUTREACH_DATABASE_URL", url.as_str()),
            ("OUTREACH_LLM_PROVIDER", "ollama"),
            ("OUTREACH_LLM_BASE_URL", "http://127.0.0.1:9"),
            ("OUTREACH_LLM_MAX_RETRIES", "1"),
            ("OUTREACH_LLM_TIMEOUT_SECS", "2"),
        ],
        || {
            let result = research::run(research::ResearchArgs {
                session: "lead:jane".to_string(),
                name: "Jane Doe".to_string(),
                email: None,
                contact_type: "emaillist".to_string(),
                context: Vec::new(),
            });
            assert_eq!(result.exit_code, 6);
            assert_eq!(parse_payload(&result.output)["error_class"], "research_unavailable");

            // No placeholder research is stored on failure.
            let inspected = parse_payload(&inspect::run("lead:jane").output);
            assert_eq!(inspected["error_class"], "not_found");
        },
    );
}

#[test]
fn research_rejects_unknown_contact_type_before_any_model_call() {
    with_env(&[API_KEY, ("OUTREACH_DATABASE_URL", "sqlite::memory:")], || {
        let result = research::run(research::ResearchArgs {
            session: "lead:acme".to_string(),
            name: "Acme".to_string(),
            email: None,
            contact_type: "partner".to_string(),
            context: Vec::new(),
        });
        assert_eq!(result.exit_code, 7);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");
    });
}

#[test]
fn config_output_redacts_api_key_and_attributes_env_source() {
    with_env(&[API_KEY, ("OUTREACH_MAX_ATTEMPTS", "5")], || {
        let output = config::run();
        assert!(output.contains("- llm.api_key = AIza*** (source: env (OUTREACH_LLM_API_KEY))"));
        assert!(!output.contains(API_KEY.1));
        assert!(output.contains("- outreach.max_attempts = 5 (source: env (OUTREACH_MAX_ATTEMPTS))"));
        assert!(output.contains("- llm.model = gemini-2.5-flash-lite (source: default)"));
    });
}

#[test]
fn doctor_passes_with_valid_env() {
    with_env(&[API_KEY, ("OUTREACH_DATABASE_URL", "sqlite::memory:")], || {
        let report = parse_payload(&doctor::run(true));
        assert_eq!(report["overall_status"], "pass");
        let names: Vec<&str> = report["checks"]
            .as_array()
            .expect("checks")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec!["config_validation", "llm_readiness", "prompt_templates", "database_connectivity"]
        );
    });
}

#[test]
fn search_reports_matching_sessions_with_excerpts() {
    let dir = TempDir::new().expect("temp dir");
    let url = file_url(&dir);
    seed(&url);
    with_env(&[API_KEY, ("OUTREACH_DATABASE_URL", url.as_str())], || {
        let result = search::run("streaming");
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(
            payload["data"]["hits"],
            serde_json::json!([
                { "session_id": "lead:jane doe", "excerpt": "Jane runs streaming infrastructure." },
                { "session_id": "company:acme", "excerpt": "Replacing the streaming stack" },
            ])
        );

        let blank = search::run("   ");
        assert_eq!(blank.exit_code, 7);
        assert_eq!(parse_payload(&blank.output)["error_class"], "invalid_input");
    });
}

fn seed(url: &str) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        let pool = connect_with_settings(url, 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let repo = SqlSessionRepository::new(pool);

        let research =
            ResearchResult::new("Jane Doe", "Jane runs streaming infrastructure.", BTreeMap::new())
                .expect("research");
        repo.save_research(&SessionId::for_lead("Jane Doe"), &research).await.expect("research");
        let acme = SessionId::parse("company:acme").expect("valid id");
        repo.create_if_absent(&acme).await.expect("create");
        let turn = Turn {
            question: "Current project?".to_owned(),
            answer: "Replacing the streaming stack".to_owned(),
        };
        repo.append_turn(&acme, &turn).await.expect("turn");
        repo.close().await;
    });
}

fn file_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("outreach.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

/// Runs `test_fn` with only `vars` among the outreach-related environment, restoring it after.
fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: Mutex<()> = Mutex::new(());
    let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

    let saved: Vec<(String, String)> = env::vars()
        .filter(|(key, _)| key.starts_with("OUTREACH_") || key == "GOOGLE_API_KEY")
        .collect();
    for (key, _) in &saved {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, _) in vars {
        env::remove_var(key);
    }
    for (key, value) in saved {
        env::set_var(key, value);
    }
}
