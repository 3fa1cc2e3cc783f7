//! Configuration types, built from environment variables.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default database location.
pub const DEFAULT_DB_PATH: &str = "./data/emails.db";

/// Default number of messages pulled per fetch.
pub const DEFAULT_FETCH_LIMIT: usize = 80;

/// IMAP source configuration.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: secrecy::SecretString,
}

/// Application configuration. Model settings are loaded separately through
/// [`LlmConfig::from_env`] so commands that never call the model need no key.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub fetch_limit: usize,
    /// `None` when `EMAIL_IMAP_HOST` is unset (IMAP source disabled).
    pub imap: Option<ImapConfig>,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("MAIL_QUERY_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let fetch_limit = parse_var(&lookup, "MAIL_QUERY_FETCH_LIMIT", DEFAULT_FETCH_LIMIT)?;

        let imap = match lookup("EMAIL_IMAP_HOST").filter(|h| !h.trim().is_empty()) {
            Some(host) => Some(ImapConfig {
                host,
                port: parse_var(&lookup, "EMAIL_IMAP_PORT", 993)?,
                username: lookup("EMAIL_USERNAME").unwrap_or_default(),
                password: secrecy::SecretString::from(lookup("EMAIL_PASSWORD").unwrap_or_default()),
            }),
            None => None,
        };

        Ok(Self {
            db_path,
            fetch_limit,
            imap,
        })
    }
}

impl LlmConfig {
    /// Read backend, API key and model from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build model settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend: LlmBackend = match lookup("MAIL_QUERY_LLM_BACKEND") {
            Some(s) => s.parse()?,
            None => LlmBackend::Mistral,
        };

        let key_var = backend.api_key_var();
        let api_key = lookup(key_var)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let model = lookup("MAIL_QUERY_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| backend.default_model().to_string());

        Ok(Self {
            backend,
            api_key: secrecy::SecretString::from(api_key),
            model,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
