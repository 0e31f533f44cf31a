//! Root service configuration: governor limits, job defaults, store backend.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::GovernorConfig;
use crate::util::ids::SYSTEM_OWNER;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "JOB_GOVERNOR_";

/// Durable store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StoreBackendConfig {
    /// In-memory store for development/testing.
    InMemory,
    /// JSON-lines journal on local disk.
    File {
        /// Directory holding the journal.
        path: PathBuf,
    },
}

/// Defaults applied to background jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Deadline applied to job bodies and governed calls, in seconds.
    pub default_deadline_secs: u64,
    /// Attempts made by retrying governed calls.
    pub max_attempts: u32,
    /// Owner recorded on system-initiated jobs.
    pub system_owner: String,
    /// Capacity of the in-memory fallback log tap.
    pub fallback_buffer: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            default_deadline_secs: 300,
            max_attempts: 3,
            system_owner: SYSTEM_OWNER.to_string(),
            fallback_buffer: 256,
        }
    }
}

impl JobsConfig {
    /// Validate job defaults.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_deadline_secs == 0 {
            return Err("default_deadline_secs must be greater than 0".into());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".into());
        }
        if self.system_owner.trim().is_empty() {
            return Err("system_owner must not be empty".into());
        }
        Ok(())
    }

    /// Default deadline as a duration.
    pub const fn default_deadline(&self) -> Duration {
        Duration::from_secs(self.default_deadline_secs)
    }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Governor limits.
    #[serde(default)]
    pub governor: GovernorConfig,
    /// Job defaults.
    #[serde(default)]
    pub jobs: JobsConfig,
    /// Store backend.
    #[serde(default = "default_store")]
    pub store: StoreBackendConfig,
}

const fn default_store() -> StoreBackendConfig {
    StoreBackendConfig::InMemory
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            governor: GovernorConfig::default(),
            jobs: JobsConfig::default(),
            store: default_store(),
        }
    }
}

impl ServiceConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.governor
            .validate()
            .map_err(|e| format!("governor invalid: {e}"))?;
        self.jobs.validate().map_err(|e| format!("jobs invalid: {e}"))?;
        if let StoreBackendConfig::File { path } = &self.store {
            if path.as_os_str().is_empty() {
                return Err("store path must not be empty".into());
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by `JOB_GOVERNOR_*`
    /// environment variables. A `.env` file is loaded first when present.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let g = &mut cfg.governor;
        override_from(&lookup, "RATE_WINDOW_MS", &mut g.rate_window_ms)?;
        override_from(&lookup, "MAX_REQUESTS_PER_WINDOW", &mut g.max_requests_per_window)?;
        override_from(&lookup, "MAX_CONSECUTIVE_ERRORS", &mut g.max_consecutive_errors)?;
        override_from(&lookup, "ERROR_WINDOW_MS", &mut g.error_window_ms)?;
        override_from(&lookup, "BREAKER_TIMEOUT_MS", &mut g.breaker_timeout_ms)?;
        override_from(&lookup, "BACKOFF_BASE_MS", &mut g.backoff_base_ms)?;
        override_from(&lookup, "BACKOFF_MAX_MS", &mut g.backoff_max_ms)?;

        let j = &mut cfg.jobs;
        override_from(&lookup, "DEFAULT_DEADLINE_SECS", &mut j.default_deadline_secs)?;
        override_from(&lookup, "MAX_ATTEMPTS", &mut j.max_attempts)?;
        override_from(&lookup, "FALLBACK_BUFFER", &mut j.fallback_buffer)?;
        if let Some(owner) = lookup(&format!("{ENV_PREFIX}SYSTEM_OWNER")) {
            j.system_owner = owner;
        }

        if let Some(path) = lookup(&format!("{ENV_PREFIX}STORE_PATH")) {
            cfg.store = StoreBackendConfig::File { path: path.into() };
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn override_from<F, T>(lookup: &F, name: &str, slot: &mut T) -> Result<(), String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{ENV_PREFIX}{name}");
    if let Some(raw) = lookup(&key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{key}: invalid value `{raw}`: {e}"))?;
    }
    Ok(())
}
