//! Configuration module for environment variable parsing.
//!
//! Required: `OPENAI_API_KEY` and `GOOGLE_PROJECT_NUMBER`. Everything else
//! falls back to a default, with a warning when a value is set but invalid.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;
use url::Url;

/// JWK set of the Google Chat issuer.
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/chat@system.gserviceaccount.com";

/// Root of the OpenAI v1 API.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub const DEFAULT_PRE_PROMPT: &str = "You are a non-verbose and to-the-point agent";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid URL in {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the completion provider
    pub openai_api_key: String,

    /// Expected `aud` claim of inbound tokens (the chat app's project number)
    pub audience: String,

    /// Address the web server binds to
    pub listen_addr: SocketAddr,

    /// System prompt sent ahead of every conversation
    pub pre_prompt: String,

    /// Completion model identifier
    pub model: String,

    /// Root URL of the completion API
    pub api_url: String,

    /// URL of the signer's JWK set
    pub jwks_url: String,

    /// Overall timeout of every outbound HTTP call
    pub request_timeout: Duration,

    /// Maximum idle connections kept per upstream host
    pub http_pool_size: usize,

    /// How long a conversation is remembered after its last reply
    pub conversation_ttl: Duration,

    /// Maximum messages kept per conversation
    pub max_history: usize,

    /// Interval between JWK set refreshes
    pub jwks_refresh_interval: Duration,

    /// Interval between sweeps of expired conversations
    pub sweep_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = required(&var, "OPENAI_API_KEY")?;
        let audience = required(&var, "GOOGLE_PROJECT_NUMBER")?;

        let api_url = var("OPENAI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        validate_url("OPENAI_API_URL", &api_url)?;

        let jwks_url = var("JWKS_URL").unwrap_or_else(|| DEFAULT_JWKS_URL.to_string());
        validate_url("JWKS_URL", &jwks_url)?;

        Ok(Config {
            openai_api_key,
            audience,

            listen_addr: parse_or(&var, "LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8000))),

            pre_prompt: var("PRE_PROMPT").unwrap_or_else(|| DEFAULT_PRE_PROMPT.to_string()),

            model: var("OPENAI_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),

            api_url,
            jwks_url,

            request_timeout: Duration::from_millis(parse_positive(&var, "REQUEST_TIMEOUT_MS", 10_000)),

            http_pool_size: parse_or(&var, "HTTP_POOL_SIZE", 10),

            conversation_ttl: Duration::from_secs(parse_positive(&var, "CONVERSATION_TTL_SECS", 3600)),

            max_history: parse_or(&var, "MAX_HISTORY", 10),

            jwks_refresh_interval: Duration::from_secs(parse_positive(&var, "JWKS_REFRESH_SECS", 1800)),

            sweep_interval: Duration::from_secs(parse_positive(&var, "SWEEP_INTERVAL_SECS", 3600)),
        })
    }
}

fn required<F>(var: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn validate_url(name: &'static str, raw: &str) -> Result<(), ConfigError> {
    Url::parse(raw)
        .map(|_| ())
        .map_err(|source| ConfigError::InvalidUrl { name, source })
}

/// Parse `name`, falling back to `default` when unset or invalid.
fn parse_or<F, T>(var: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = match var(name) {
        Some(v) => v,
        None => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Like [`parse_or`] for intervals, which must be non-zero.
fn parse_positive<F>(var: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(var, name, default) {
        0 => {
            warn!(env_var = name, "Zero interval, using default");
            default
        }
        v => v,
    }
}
