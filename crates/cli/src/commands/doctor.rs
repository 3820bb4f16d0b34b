//! Readiness probes for a local install: configuration, model client, prompt templates and the
//! session database. Probes that need a loaded configuration are skipped when it fails.

use outreach_agent::prompts::PromptLibrary;
use outreach_core::config::{AppConfig, LlmProvider, LoadOptions};
use outreach_db::{connect_with_settings, migrations};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Verdict {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct Probe {
    name: &'static str,
    status: Verdict,
    details: String,
}

impl Probe {
    fn from_outcome(name: &'static str, outcome: Result<String, String>) -> Self {
        match outcome {
            Ok(details) => Self { name, status: Verdict::Pass, details },
            Err(details) => Self { name, status: Verdict::Fail, details },
        }
    }

    fn skipped(name: &'static str) -> Self {
        Self { name, status: Verdict::Skipped, details: "needs a valid configuration".to_string() }
    }
}

#[derive(Debug, Serialize)]
struct Readiness {
    overall_status: Verdict,
    summary: String,
    checks: Vec<Probe>,
}

impl Readiness {
    fn from_probes(checks: Vec<Probe>) -> Self {
        let failing = checks.iter().filter(|probe| probe.status != Verdict::Pass).count();
        let (overall_status, summary) = if failing == 0 {
            (Verdict::Pass, format!("ready: {} checks passed", checks.len()))
        } else {
            (Verdict::Fail, format!("not ready: {failing} of {} checks did not pass", checks.len()))
        };
        Self { overall_status, summary, checks }
    }

    fn to_text(&self) -> String {
        let mut out = self.summary.clone();
        for probe in &self.checks {
            let tag = match probe.status {
                Verdict::Pass => "ok  ",
                Verdict::Fail => "FAIL",
                Verdict::Skipped => "--  ",
            };
            out.push_str(&format!("\n  {tag} {:<22} {}", probe.name, probe.details));
        }
        out
    }
}

pub fn run(json_output: bool) -> String {
    let readiness = Readiness::from_probes(run_probes(AppConfig::load(LoadOptions::default())));

    if !json_output {
        return readiness.to_text();
    }
    match serde_json::to_string_pretty(&readiness) {
        Ok(json) => json,
        Err(error) => serde_json::json!({
            "overall_status": "fail",
            "summary": "readiness report could not be serialized",
            "error": error.to_string(),
        })
        .to_string(),
    }
}

fn run_probes<E: std::fmt::Display>(loaded: Result<AppConfig, E>) -> Vec<Probe> {
    let config = match loaded {
        Ok(config) => config,
        Err(error) => {
            return vec![
                Probe::from_outcome("config_validation", Err(error.to_string())),
                Probe::skipped("llm_readiness"),
                Probe::from_outcome("prompt_templates", probe_prompts()),
                Probe::skipped("database_connectivity"),
            ];
        }
    };

    vec![
        Probe::from_outcome("config_validation", Ok(format!("loaded `{}`", config_origin()))),
        Probe::from_outcome("llm_readiness", probe_llm(&config)),
        Probe::from_outcome("prompt_templates", probe_prompts()),
        Probe::from_outcome("database_connectivity", probe_database(&config)),
    ]
}

fn config_origin() -> String {
    outreach_core::config::locate_config_file(None)
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "defaults and environment".to_string())
}

fn probe_llm(config: &AppConfig) -> Result<String, String> {
    let llm = &config.llm;
    outreach_agent::build_client(llm).map_err(|error| error.to_string())?;

    let grounding = match (llm.provider, llm.search_grounding) {
        (LlmProvider::Gemini, true) => "search grounding on",
        (LlmProvider::Gemini, false) => "search grounding off",
        (LlmProvider::Ollama, _) => "no search grounding",
    };
    Ok(format!(
        "{} `{}` at {} ({grounding}, {} attempt(s) per call)",
        llm.provider.as_str(),
        llm.model,
        llm.effective_base_url(),
        llm.max_retries.max(1)
    ))
}

fn probe_prompts() -> Result<String, String> {
    PromptLibrary::new()
        .map(|_| "templates compiled".to_string())
        .map_err(|error| error.to_string())
}

fn probe_database(config: &AppConfig) -> Result<String, String> {
    let db = &config.database;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| format!("async runtime unavailable: {error}"))?;

    runtime.block_on(async {
        let pool = connect_with_settings(&db.url, db.max_connections, db.timeout_secs)
            .await
            .map_err(|error| format!("cannot open `{}`: {error}", db.url))?;
        let migrated = migrations::run_pending(&pool).await;
        pool.close().await;
        migrated.map_err(|error| format!("opened `{}` but migrating failed: {error}", db.url))
    })?;

    Ok(format!("`{}` open, schema current", db.url))
}
