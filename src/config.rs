//! Defaults, environment variable names and the on-disk configuration.
//!
//! Precedence, lowest first: built-in defaults, `~/.kitwarden/config.json`,
//! `KITWARDEN_*` environment variables, command line flags.

use crate::core::models::{ConvergenceTarget, RetryPolicy};
use crate::error::{ConfigError, PreconditionViolation};
use crate::provider::ProcessTableConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_DIRECTORY: &str = ".kitwarden";
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_SUPERVISOR_NAME: &str = "forkit";
pub const DEFAULT_SPARE_PREFIX: &str = "kit_spare_";
pub const DEFAULT_DOC_PREFIX: &str = "kitbroker_";

pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 40_000;
pub const DEFAULT_WAIT_RETRY_MS: u64 = 50;
pub const DEFAULT_REAP_TIMEOUT_MS: u64 = 40_000;
pub const DEFAULT_REAP_RETRY_MS: u64 = 10;

pub const WAIT_TIMEOUT_ENV: &str = "KITWARDEN_WAIT_TIMEOUT_MS";
pub const WAIT_RETRY_ENV: &str = "KITWARDEN_WAIT_RETRY_MS";
pub const REAP_TIMEOUT_ENV: &str = "KITWARDEN_REAP_TIMEOUT_MS";
pub const REAP_RETRY_ENV: &str = "KITWARDEN_REAP_RETRY_MS";
pub const SUPERVISOR_PID_ENV: &str = "KITWARDEN_SUPERVISOR_PID";

/// Timeout and poll interval in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub timeout_ms: u64,
    pub retry_ms: u64,
}

impl PolicyConfig {
    pub const fn new(timeout_ms: u64, retry_ms: u64) -> Self {
        Self {
            timeout_ms,
            retry_ms,
        }
    }

    pub fn to_policy(&self) -> Result<RetryPolicy, PreconditionViolation> {
        RetryPolicy::from_millis(self.timeout_ms, self.retry_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Budget of `wait`
    pub wait: PolicyConfig,
    /// Budget of `reap`
    pub reap: PolicyConfig,
    pub target: ConvergenceTarget,
    pub process_table: ProcessTableConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            wait: PolicyConfig::new(DEFAULT_WAIT_TIMEOUT_MS, DEFAULT_WAIT_RETRY_MS),
            reap: PolicyConfig::new(DEFAULT_REAP_TIMEOUT_MS, DEFAULT_REAP_RETRY_MS),
            target: ConvergenceTarget::default(),
            process_table: ProcessTableConfig::default(),
        }
    }
}

impl WatchConfig {
    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::InvalidFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `KITWARDEN_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any lookup; unset or empty variables are skipped.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = read_u64(&lookup, WAIT_TIMEOUT_ENV)? {
            self.wait.timeout_ms = value;
        }
        if let Some(value) = read_u64(&lookup, WAIT_RETRY_ENV)? {
            self.wait.retry_ms = value;
        }
        if let Some(value) = read_u64(&lookup, REAP_TIMEOUT_ENV)? {
            self.reap.timeout_ms = value;
        }
        if let Some(value) = read_u64(&lookup, REAP_RETRY_ENV)? {
            self.reap.retry_ms = value;
        }
        // Signed: 0 and negatives are passed on to the supervisor assertion
        if let Some(raw) = lookup(SUPERVISOR_PID_ENV).filter(|value| !value.trim().is_empty()) {
            let pid = raw.trim().parse::<i64>().map_err(|_| ConfigError::InvalidEnv {
                name: SUPERVISOR_PID_ENV.to_string(),
                value: raw.clone(),
            })?;
            self.process_table.supervisor_pid = Some(pid);
        }
        Ok(())
    }
}

fn read_u64<F>(lookup: &F, name: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value: raw,
            }),
        _ => Ok(None),
    }
}
