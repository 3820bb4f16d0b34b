//! Layered configuration: built-in defaults, then `outreach.toml`, then `OUTREACH_*`
//! environment variables, then explicit [`ConfigOverrides`]. Every layer is a [`ConfigPatch`]
//! merged onto the previous one, and the result is validated before it is handed out.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::approvals::DEFAULT_MAX_ATTEMPTS;
use crate::domain::contact::SenderProfile;

pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["outreach.toml", "config/outreach.toml"];

/// Accepted as a fallback for `llm.api_key` when neither the file nor `OUTREACH_LLM_API_KEY`
/// provides one.
pub const GOOGLE_API_KEY_VAR: &str = "GOOGLE_API_KEY";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub outreach: OutreachConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    /// Total attempts per model call, the first one included.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub search_grounding: bool,
}

#[derive(Clone, Debug)]
pub struct OutreachConfig {
    /// Zero or negative still allows a single generation.
    pub max_attempts: i32,
    pub sender_name: Option<String>,
    pub career_field: Option<String>,
    pub career_description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub max_attempts: Option<i32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    MissingConfigFile(PathBuf),
    #[error("`${{{var}}}` is referenced in the config file but not set in the environment")]
    MissingEnvInterpolation { var: String },
    #[error("`${{` in the config file is never closed")]
    UnterminatedInterpolation,
    #[error("`{key}` has an unusable value `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://outreach.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: None,
                model: "gemini-2.5-flash-lite".to_string(),
                timeout_secs: 60,
                max_retries: 3,
                retry_delay_ms: 2_000,
                search_grounding: true,
            },
            outreach: OutreachConfig {
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                sender_name: None,
                career_field: None,
                career_description: None,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown provider `{other}`")),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

impl OutreachConfig {
    /// Sender profile from configuration; `None` until a career field is configured.
    pub fn sender_profile(&self) -> Option<SenderProfile> {
        let career_field = self.career_field.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        Some(SenderProfile {
            name: self.sender_name.clone(),
            career_field: career_field.to_string(),
            career_description: self.career_description.clone().unwrap_or_default(),
        })
    }
}

impl LlmConfig {
    /// Base URL for the configured provider, falling back to the provider's public default.
    pub fn effective_base_url(&self) -> &str {
        match (self.base_url.as_deref(), self.provider) {
            (Some(url), _) if !url.trim().is_empty() => url.trim_end_matches('/'),
            (_, LlmProvider::Gemini) => "https://generativelanguage.googleapis.com/v1beta",
            (_, LlmProvider::Ollama) => "http://localhost:11434",
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match locate_config_file(options.config_path.as_deref()) {
            Some(path) => config.merge(read_patch(&path)?),
            None if options.require_file => {
                let expected =
                    options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.merge(ConfigPatch::from_env()?);
        if config.llm.api_key.is_none() {
            config.llm.api_key = env_text(GOOGLE_API_KEY_VAR).map(SecretString::from);
        }
        config.merge(options.overrides.into());

        config.validate()?;
        Ok(config)
    }

    fn merge(&mut self, patch: ConfigPatch) {
        let ConfigPatch { database, llm, outreach, server, logging } = patch;

        overlay(&mut self.database.url, database.url);
        overlay(&mut self.database.max_connections, database.max_connections);
        overlay(&mut self.database.timeout_secs, database.timeout_secs);

        overlay(&mut self.llm.provider, llm.provider);
        overlay_optional(&mut self.llm.api_key, llm.api_key.map(SecretString::from));
        overlay_optional(&mut self.llm.base_url, llm.base_url);
        overlay(&mut self.llm.model, llm.model);
        overlay(&mut self.llm.timeout_secs, llm.timeout_secs);
        overlay(&mut self.llm.max_retries, llm.max_retries);
        overlay(&mut self.llm.retry_delay_ms, llm.retry_delay_ms);
        overlay(&mut self.llm.search_grounding, llm.search_grounding);

        overlay(&mut self.outreach.max_attempts, outreach.max_attempts);
        overlay_optional(&mut self.outreach.sender_name, outreach.sender_name);
        overlay_optional(&mut self.outreach.career_field, outreach.career_field);
        overlay_optional(&mut self.outreach.career_description, outreach.career_description);

        overlay(&mut self.server.bind_address, server.bind_address);
        overlay(&mut self.server.port, server.port);
        overlay(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);

        overlay(&mut self.logging.level, logging.level);
        overlay(&mut self.logging.format, logging.format);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let database_url = self.database.url.trim();
        require(
            database_url.starts_with("sqlite:") || database_url == ":memory:",
            "database.url must point at SQLite (`sqlite://<path>` or `sqlite::memory:`)",
        )?;
        require(self.database.max_connections > 0, "database.max_connections must be at least 1")?;
        require(
            (1..=300).contains(&self.database.timeout_secs),
            "database.timeout_secs must be between 1 and 300",
        )?;

        let llm = &self.llm;
        require(
            (1..=300).contains(&llm.timeout_secs),
            "llm.timeout_secs must be between 1 and 300",
        )?;
        require(llm.max_retries > 0, "llm.max_retries counts the first call and must be at least 1")?;
        require(!llm.model.trim().is_empty(), "llm.model must name a model")?;
        match llm.provider {
            LlmProvider::Gemini => require(
                llm.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty()),
                "llm.api_key is required for gemini (set OUTREACH_LLM_API_KEY or GOOGLE_API_KEY)",
            )?,
            LlmProvider::Ollama => require(
                llm.base_url.as_deref().is_some_and(|url| !url.trim().is_empty()),
                "llm.base_url is required for ollama (e.g. http://localhost:11434)",
            )?,
        }
        if let Some(base_url) = llm.base_url.as_deref().map(str::trim) {
            require(
                base_url.starts_with("http://") || base_url.starts_with("https://"),
                "llm.base_url must be an http:// or https:// URL",
            )?;
        }

        require(self.server.port > 0, "server.port must be non-zero")?;
        require(
            self.server.graceful_shutdown_secs > 0,
            "server.graceful_shutdown_secs must be at least 1",
        )?;

        require(
            matches!(
                self.logging.level.trim().to_ascii_lowercase().as_str(),
                "trace" | "debug" | "info" | "warn" | "error"
            ),
            "logging.level must be trace, debug, info, warn or error",
        )
    }
}

/// The explicit path when it exists, otherwise the first of [`DEFAULT_CONFIG_PATHS`] present
/// in the working directory.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists()),
    }
}

fn overlay<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn overlay_optional<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn require(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.to_string()))
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&interpolate_env_vars(&raw)?)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${VAR}` with the value of `VAR`.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &after_open[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &after_open[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn env_text(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_text(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Ok(Some(value)),
            Err(_) => Err(ConfigError::InvalidEnvOverride { key: key.to_string(), value: raw }),
        },
    }
}

/// One configuration layer; `None` leaves the underlying value untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigPatch {
    database: DatabasePatch,
    llm: LlmPatch,
    outreach: OutreachPatch,
    server: ServerPatch,
    logging: LoggingPatch,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    search_grounding: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct OutreachPatch {
    max_attempts: Option<i32>,
    sender_name: Option<String>,
    career_field: Option<String>,
    career_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl ConfigPatch {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabasePatch {
                url: env_text("OUTREACH_DATABASE_URL"),
                max_connections: env_parsed("OUTREACH_DATABASE_MAX_CONNECTIONS")?,
                timeout_secs: env_parsed("OUTREACH_DATABASE_TIMEOUT_SECS")?,
            },
            llm: LlmPatch {
                provider: env_parsed("OUTREACH_LLM_PROVIDER")?,
                api_key: env_text("OUTREACH_LLM_API_KEY"),
                base_url: env_text("OUTREACH_LLM_BASE_URL"),
                model: env_text("OUTREACH_LLM_MODEL"),
                timeout_secs: env_parsed("OUTREACH_LLM_TIMEOUT_SECS")?,
                max_retries: env_parsed("OUTREACH_LLM_MAX_RETRIES")?,
                retry_delay_ms: env_parsed("OUTREACH_LLM_RETRY_DELAY_MS")?,
                search_grounding: env_parsed("OUTREACH_LLM_SEARCH_GROUNDING")?,
            },
            outreach: OutreachPatch {
                max_attempts: env_parsed("OUTREACH_MAX_ATTEMPTS")?,
                sender_name: env_text("OUTREACH_SENDER_NAME"),
                career_field: env_text("OUTREACH_CAREER_FIELD"),
                career_description: env_text("OUTREACH_CAREER_DESCRIPTION"),
            },
            server: ServerPatch {
                bind_address: env_text("OUTREACH_SERVER_BIND_ADDRESS"),
                port: env_parsed("OUTREACH_SERVER_PORT")?,
                graceful_shutdown_secs: env_parsed("OUTREACH_SERVER_GRACEFUL_SHUTDOWN_SECS")?,
            },
            logging: LoggingPatch {
                level: env_text("OUTREACH_LOGGING_LEVEL").or_else(|| env_text("OUTREACH_LOG_LEVEL")),
                format: match env_parsed("OUTREACH_LOGGING_FORMAT")? {
                    Some(format) => Some(format),
                    None => env_parsed("OUTREACH_LOG_FORMAT")?,
                },
            },
        })
    }
}

impl From<ConfigOverrides> for ConfigPatch {
    fn from(overrides: ConfigOverrides) -> Self {
        Self {
            database: DatabasePatch { url: overrides.database_url, ..DatabasePatch::default() },
            llm: LlmPatch {
                provider: overrides.llm_provider,
                base_url: overrides.llm_base_url,
                model: overrides.llm_model,
                ..LlmPatch::default()
            },
            outreach: OutreachPatch {
                max_attempts: overrides.max_attempts,
                ..OutreachPatch::default()
            },
            logging: LoggingPatch { level: overrides.log_level, ..LoggingPatch::default() },
            ..ConfigPatch::default()
        }
    }
}
