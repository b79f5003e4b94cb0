//! Unified error handling for kitwarden
//!
//! Convergence and reaping failures are returned as values so the calling
//! harness decides whether to abort the current test case. Individual kill
//! failures never surface here; they are logged by the terminator.

use crate::core::models::{ConvergenceTarget, KitSnapshot, ProcessId};
use crate::core::pid_set::ProcessIdSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum KitWardenError {
    /// Convergence or reaping did not finish within its budget
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// A caller or the system under test handed us something impossible
    #[error(transparent)]
    Precondition(#[from] PreconditionViolation),

    /// The pid set provider could not answer a query
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Budget exhausted. Always carries the full observed state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError {
    #[error(
        "Timed out waiting for kit processes ({label}) after {attempts} attempts: Current kit processes: {}",
        describe_observation(.observed, .target)
    )]
    Convergence {
        label: String,
        attempts: u32,
        elapsed: Duration,
        observed: KitSnapshot,
        target: Option<ConvergenceTarget>,
    },

    #[error(
        "Timed out waiting for these kit processes to close after {attempts} attempts: before: {before} current: {current} intersection: {survivors}"
    )]
    Reap {
        attempts: u32,
        elapsed: Duration,
        before: ProcessIdSet,
        current: ProcessIdSet,
        survivors: ProcessIdSet,
    },
}

fn describe_observation(observed: &KitSnapshot, target: &Option<ConvergenceTarget>) -> String {
    observed.describe(target.as_ref())
}

impl TimeoutError {
    pub fn attempts(&self) -> u32 {
        match self {
            TimeoutError::Convergence { attempts, .. } | TimeoutError::Reap { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Processes that refused to die, for reap timeouts.
    pub fn survivors(&self) -> Option<&ProcessIdSet> {
        match self {
            TimeoutError::Reap { survivors, .. } => Some(survivors),
            TimeoutError::Convergence { .. } => None,
        }
    }
}

/// Programming errors in the caller or the system under test. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionViolation {
    #[error("Expected {role} process id to be > 0, got {pid}")]
    InvalidPid { role: &'static str, pid: i64 },

    #[error("Invalid retry policy: {message}")]
    InvalidPolicy { message: String },

    #[error("Invalid convergence target: {message}")]
    InvalidTarget { message: String },
}

/// Pid set provider failures
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to read the process table: {0}")]
    ProcessTable(String),

    #[error("Supervisor process not found: {0}")]
    SupervisorNotFound(String),

    #[error("Provider reported an invalid pid: {0}")]
    InvalidPid(#[from] PreconditionViolation),

    #[error("Process table is not supported on this platform")]
    UnsupportedPlatform,
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A single termination request that the OS refused.
///
/// Only ever logged. A batch of kills keeps going when one fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("kill({pid}, {signal}) failed: {symbol}: {message}")]
pub struct SignalError {
    pub pid: ProcessId,
    pub signal: &'static str,
    pub errno: i32,
    pub symbol: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Invalid JSON in config file {path}: {source}")]
    InvalidFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {name}: {value:?} (expected a non-negative integer)")]
    InvalidEnv { name: String, value: String },

    #[error("Cannot find home directory")]
    NoHomeDirectory,
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Timeout,
    Precondition,
    Provider,
    Config,
}

impl ErrorCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "Timeout",
            ErrorCategory::Precondition => "Precondition",
            ErrorCategory::Provider => "Provider",
            ErrorCategory::Config => "Configuration",
        }
    }
}

impl KitWardenError {
    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            KitWardenError::Timeout(_) => ErrorCategory::Timeout,
            KitWardenError::Precondition(_) => ErrorCategory::Precondition,
            KitWardenError::Provider(ProviderError::InvalidPid(_)) => ErrorCategory::Precondition,
            KitWardenError::Provider(_) => ErrorCategory::Provider,
            KitWardenError::Config(_) => ErrorCategory::Config,
        }
    }

    /// Timeouts fail only the current test case; everything else points at a bug.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Timeout)
    }

    /// Process exit code used by the CLI
    pub fn exit_code(&self) -> u8 {
        match self.category() {
            ErrorCategory::Timeout | ErrorCategory::Provider => 1,
            ErrorCategory::Precondition | ErrorCategory::Config => 2,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        format!("{} error: {}", self.category().display_name(), self)
    }

    pub fn as_timeout(&self) -> Option<&TimeoutError> {
        match self {
            KitWardenError::Timeout(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ConvergenceTarget;

    fn set(raw: &[i64]) -> ProcessIdSet {
        ProcessIdSet::from_raw(raw.iter().copied()).unwrap()
    }

    #[test]
    fn test_error_categories() {
        let err: KitWardenError = PreconditionViolation::InvalidPid {
            role: "supervisor",
            pid: 0,
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Precondition);
        assert_eq!(err.exit_code(), 2);
        assert!(!err.is_recoverable());

        let nested: KitWardenError = ProviderError::InvalidPid(PreconditionViolation::InvalidPid {
            role: "kit",
            pid: -3,
        })
        .into();
        assert_eq!(nested.category(), ErrorCategory::Precondition);

        let provider: KitWardenError = ProviderError::SupervisorNotFound("forkit".into()).into();
        assert_eq!(provider.category(), ErrorCategory::Provider);
        assert_eq!(provider.exit_code(), 1);
    }

    #[test]
    fn test_convergence_timeout_message_embeds_state() {
        let err = TimeoutError::Convergence {
            label: "kit pids ready".into(),
            attempts: 11,
            elapsed: Duration::from_millis(100),
            observed: KitSnapshot::new(set(&[42]), set(&[7, 3])),
            target: Some(ConvergenceTarget::default()),
        };
        let message = err.to_string();
        assert!(message.contains("after 11 attempts"));
        assert!(message.contains("Doc Kits (1, expect: 0): [42]"));
        assert!(message.contains("Spare Kits (2, expect: >= 1): [3, 7]"));
    }

    #[test]
    fn test_reap_timeout_lists_survivors() {
        let err = TimeoutError::Reap {
            attempts: 3,
            elapsed: Duration::from_millis(20),
            before: set(&[10, 11, 12]),
            current: set(&[12, 40]),
            survivors: set(&[12]),
        };
        assert_eq!(err.survivors(), Some(&set(&[12])));
        assert_eq!(
            err.to_string(),
            "Timed out waiting for these kit processes to close after 3 attempts: \
             before: [10, 11, 12] current: [12, 40] intersection: [12]"
        );
    }

    #[test]
    fn test_user_message_has_category_prefix() {
        let err: KitWardenError = PreconditionViolation::InvalidPolicy {
            message: "poll interval must be > 0".into(),
        }
        .into();
        assert!(err.user_message().starts_with("Precondition error: "));
    }
}
