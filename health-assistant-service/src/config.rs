use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "openai/gpt-4.1-mini";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Settings read once at startup.
#[derive(Clone)]
pub struct ServiceConfig {
    pub openrouter_api_key: String,
    pub llm_model: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub generation_timeout: Duration,
    pub max_tool_rounds: usize,
    pub max_upload_bytes: usize,
    pub llm_temperature: f64,
    pub session_ttl: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name → value lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let openrouter_api_key =
            get("OPENROUTER_API_KEY").ok_or(ConfigError::Missing("OPENROUTER_API_KEY"))?;

        let llm_temperature = parse_or(&get, "LLM_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        if !(0.0..=2.0).contains(&llm_temperature) {
            return Err(ConfigError::Invalid {
                name: "LLM_TEMPERATURE",
                value: llm_temperature.to_string(),
            });
        }

        let timeout_secs = parse_or(&get, "GENERATION_TIMEOUT_SECS", DEFAULT_GENERATION_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "GENERATION_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        let session_ttl_secs = parse_or(&get, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        if session_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_TTL_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            openrouter_api_key,
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            database_url: get("DATABASE_URL"),
            generation_timeout: Duration::from_secs(timeout_secs),
            max_tool_rounds: parse_or(
                &get,
                "MAX_TOOL_ROUNDS",
                health_flow::DEFAULT_MAX_TOOL_ROUNDS,
            )?,
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            llm_temperature,
            session_ttl: Duration::from_secs(session_ttl_secs),
        })
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("llm_model", &self.llm_model)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("generation_timeout", &self.generation_timeout)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("llm_temperature", &self.llm_temperature)
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}
