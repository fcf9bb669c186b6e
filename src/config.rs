//! Runtime configuration, loaded once at startup from the environment.

use std::net::SocketAddr;

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Parameters for one model call site.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-attempt HTTP timeout.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    /// SHA-256 of the service key. The plaintext key is never retained.
    pub service_key_hash: Option<[u8; 32]>,
    pub photo: ModelParams,
    pub diagnosis: ModelParams,
    /// Retries after the first attempt, per request.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub signed_url_ttl_secs: u64,
}

/// SHA-256 digest of a shared secret, for constant-time comparison later.
pub fn hash_secret(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_var(var) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            message: e.to_string(),
        }),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: None,
            service_key_hash: None,
            photo: ModelParams {
                model: "gpt-4o".to_string(),
                temperature: 0.2,
                max_tokens: 1200,
                timeout_secs: 25,
            },
            diagnosis: ModelParams {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.2,
                max_tokens: 1500,
                timeout_secs: 20,
            },
            max_retries: 2,
            backoff_base_ms: 1000,
            signed_url_ttl_secs: 300,
        }
    }
}

impl AppConfig {
    /// Load configuration from `DERMATIK_*` / `OPENAI_*` variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut config = Self {
            bind_addr: env_parse("DERMATIK_BIND_ADDR", defaults.bind_addr)?,
            openai_base_url: env_var("OPENAI_BASE_URL")
                .unwrap_or_else(|| defaults.openai_base_url.clone()),
            openai_api_key: env_var("OPENAI_API_KEY"),
            service_key_hash: env_var("DERMATIK_SERVICE_KEY")
                .map(|key| hash_secret(&key)),
            max_retries: env_parse("DERMATIK_MAX_RETRIES", defaults.max_retries)?,
            backoff_base_ms: env_parse(
                "DERMATIK_BACKOFF_BASE_MS",
                defaults.backoff_base_ms,
            )?,
            signed_url_ttl_secs: env_parse(
                "DERMATIK_SIGNED_URL_TTL_SECS",
                defaults.signed_url_ttl_secs,
            )?,
            ..defaults
        };

        if let Some(model) = env_var("DERMATIK_PHOTO_MODEL") {
            config.photo.model = model;
        }
        if let Some(model) = env_var("DERMATIK_DIAGNOSIS_MODEL") {
            config.diagnosis.model = model;
        }

        Ok(config)
    }
}
