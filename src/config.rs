//! Process configuration.
//!
//! Resolved from environment variables exactly once at startup and passed
//! by reference into the server, factory, generators, and orchestrator.
//! Missing credentials for a selected non-mock provider are a startup
//! failure, not a deferred one.

use std::path::PathBuf;
use std::time::Duration;

/// Default model per provider, overridable with `SIMFORGE_MODEL`.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";

/// Supported provider names.
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "anthropic", "mock"];

/// Configuration errors are fatal at startup and never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown provider {0:?}; expected one of: openai, anthropic, mock")]
    UnknownProvider(String),
    #[error("provider {provider:?} selected but {var} is not set")]
    MissingCredential {
        provider: &'static str,
        var: &'static str,
    },
    #[error("{var} is not set")]
    MissingVar { var: &'static str },
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Selected content provider: "openai", "anthropic", or "mock".
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// Model override; each provider has its own default.
    pub model: Option<String>,

    /// PostgREST endpoint of the backing store.
    pub supabase_url: String,
    pub supabase_service_role_key: String,

    /// Upper bound on tasks per generation request.
    pub max_tasks_per_request: usize,
    /// Deadline applied when a task's estimated duration is unparseable.
    pub default_deadline_days: i64,
    /// Allowed divergence between a reported overall score and the sum of
    /// its criterion scores before the total is recomputed.
    pub score_tolerance: i64,
    /// Minimum spacing between sequential provider calls in series/batch
    /// operations.
    pub call_interval: Duration,
    /// Per-request provider timeout.
    pub request_timeout: Duration,

    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
    /// Directory holding runtime-tunable settings.
    pub working_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            openai_api_key: None,
            anthropic_api_key: None,
            model: None,
            supabase_url: String::new(),
            supabase_service_role_key: String::new(),
            max_tasks_per_request: 5,
            default_deadline_days: 7,
            score_tolerance: 5,
            call_interval: Duration::from_millis(1500),
            request_timeout: Duration::from_secs(120),
            host: "0.0.0.0".to_string(),
            port: 8080,
            dev_mode: false,
            working_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let provider = env_or("SIMFORGE_PROVIDER", &defaults.provider).to_lowercase();
        let config = Self {
            provider,
            openai_api_key: non_empty(std::env::var("OPENAI_API_KEY").ok()),
            anthropic_api_key: non_empty(std::env::var("ANTHROPIC_API_KEY").ok()),
            model: non_empty(std::env::var("SIMFORGE_MODEL").ok()),
            supabase_url: require("SUPABASE_URL")?,
            supabase_service_role_key: require("SUPABASE_SERVICE_ROLE_KEY")?,
            max_tasks_per_request: env_parse(
                "SIMFORGE_MAX_TASKS_PER_REQUEST",
                defaults.max_tasks_per_request,
            )?,
            default_deadline_days: env_parse(
                "SIMFORGE_DEFAULT_DEADLINE_DAYS",
                defaults.default_deadline_days,
            )?,
            score_tolerance: env_parse("SIMFORGE_SCORE_TOLERANCE", defaults.score_tolerance)?,
            call_interval: Duration::from_millis(env_parse(
                "SIMFORGE_CALL_INTERVAL_MS",
                defaults.call_interval.as_millis() as u64,
            )?),
            request_timeout: Duration::from_secs(env_parse(
                "SIMFORGE_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            host: env_or("HOST", &defaults.host),
            port: env_parse("PORT", defaults.port)?,
            dev_mode: env_parse("DEV_MODE", false)?,
            working_dir: std::env::var("SIMFORGE_WORKING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.working_dir),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check provider selection and required credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(ConfigError::UnknownProvider(self.provider.clone()));
        }
        match self.provider.as_str() {
            "openai" if self.openai_api_key.is_none() => Err(ConfigError::MissingCredential {
                provider: "openai",
                var: "OPENAI_API_KEY",
            }),
            "anthropic" if self.anthropic_api_key.is_none() => {
                Err(ConfigError::MissingCredential {
                    provider: "anthropic",
                    var: "ANTHROPIC_API_KEY",
                })
            }
            _ => Ok(()),
        }
    }

    /// Resolved model name for a provider: the override if set, else the
    /// provider's default.
    pub fn model_for(&self, provider: &str) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match provider {
            "anthropic" => DEFAULT_ANTHROPIC_MODEL.to_string(),
            _ => DEFAULT_OPENAI_MODEL.to_string(),
        }
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar { var })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
