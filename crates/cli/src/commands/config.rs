use std::env;
use std::fs;
use std::path::PathBuf;

use outreach_core::config::{locate_config_file, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Entry {
    Entry { key, value: value.into(), env_keys }
}

fn optional(value: Option<&str>) -> String {
    value.map(str::to_string).unwrap_or_else(|| "<unset>".to_string())
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let entries = [
        entry("database.url", &config.database.url, &["OUTREACH_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["OUTREACH_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["OUTREACH_DATABASE_TIMEOUT_SECS"],
        ),
        entry("llm.provider", config.llm.provider.as_str(), &["OUTREACH_LLM_PROVIDER"]),
        entry("llm.model", &config.llm.model, &["OUTREACH_LLM_MODEL"]),
        entry("llm.base_url", config.llm.effective_base_url(), &["OUTREACH_LLM_BASE_URL"]),
        entry("llm.api_key", api_key, &["OUTREACH_LLM_API_KEY", "GOOGLE_API_KEY"]),
        entry(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["OUTREACH_LLM_TIMEOUT_SECS"],
        ),
        entry("llm.max_retries", config.llm.max_retries.to_string(), &["OUTREACH_LLM_MAX_RETRIES"]),
        entry(
            "llm.retry_delay_ms",
            config.llm.retry_delay_ms.to_string(),
            &["OUTREACH_LLM_RETRY_DELAY_MS"],
        ),
        entry(
            "llm.search_grounding",
            config.llm.search_grounding.to_string(),
            &["OUTREACH_LLM_SEARCH_GROUNDING"],
        ),
        entry(
            "outreach.max_attempts",
            config.outreach.max_attempts.to_string(),
            &["OUTREACH_MAX_ATTEMPTS"],
        ),
        entry(
            "outreach.sender_name",
            optional(config.outreach.sender_name.as_deref()),
            &["OUTREACH_SENDER_NAME"],
        ),
        entry(
            "outreach.career_field",
            optional(config.outreach.career_field.as_deref()),
            &["OUTREACH_CAREER_FIELD"],
        ),
        entry(
            "outreach.career_description",
            optional(config.outreach.career_description.as_deref()),
            &["OUTREACH_CAREER_DESCRIPTION"],
        ),
        entry(
            "server.bind_address",
            &config.server.bind_address,
            &["OUTREACH_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["OUTREACH_SERVER_PORT"]),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["OUTREACH_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry(
            "logging.level",
            &config.logging.level,
            &["OUTREACH_LOGGING_LEVEL", "OUTREACH_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["OUTREACH_LOGGING_FORMAT", "OUTREACH_LOG_FORMAT"],
        ),
    ];

    let provenance = Provenance::discover();
    let mut report = String::from("effective config (source precedence: env > file > default):");
    for entry in &entries {
        let source = provenance.source_of(entry.key, entry.env_keys);
        report.push_str(&format!("\n- {} = {} (source: {source})", entry.key, entry.value));
    }
    report
}

/// Where each effective value came from: an env var, the discovered config file, or a default.
struct Provenance {
    file: Option<(PathBuf, Value)>,
}

impl Provenance {
    fn discover() -> Self {
        let file = locate_config_file(None).and_then(|path| {
            let document = fs::read_to_string(&path).ok()?.parse::<Value>().ok()?;
            Some((path, document))
        });
        Self { file }
    }

    fn source_of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }
        match &self.file {
            Some((path, document)) if contains_path(document, key_path) => {
                format!("file ({})", path.display())
            }
            _ => "default".to_owned(),
        }
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |node, key| node.get(key)).is_some()
}

/// Shows at most the first four characters of a secret.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.chars().count() <= 8 {
        return "<redacted>".to_string();
    }
    let prefix: String = trimmed.chars().take(4).collect();
    format!("{prefix}***")
}
