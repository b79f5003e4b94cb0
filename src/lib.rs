//! Kitwarden Library
//!
//! Convergence checks and reaping for the kit worker processes of a
//! multi-process document server, used by its test harness.
//!
//! ```no_run
//! use kitwarden::{ConvergencePoller, ConvergenceTarget, ProcessTableConfig, ProcessTableProvider, RetryPolicy};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(ProcessTableProvider::new(ProcessTableConfig::default()));
//! let policy = RetryPolicy::from_millis(40_000, 50)?;
//! let report = ConvergencePoller::new(provider).wait_for_kit_pids_ready(&ConvergenceTarget::default(), &policy)?;
//! println!("ready after {} attempts", report.attempts);
//! # Ok::<(), kitwarden::KitWardenError>(())
//! ```

pub mod commands;
pub mod config;
pub mod convergence;
pub mod core;
pub mod error;
pub mod platform;
pub mod provider;
pub mod reaper;
pub mod report;
pub mod terminator;
pub mod utils;

// Re-export commonly used types for convenience
pub use convergence::{log_kit_processes, ConvergencePoller, Sleeper, ThreadSleeper};
pub use crate::core::models::*;
pub use crate::core::pid_set::ProcessIdSet;
pub use error::{
    ErrorCategory, KitWardenError, PreconditionViolation, ProviderError, SignalError, TimeoutError,
};
pub use provider::{
    supervisor_process_id, InMemoryProvider, MemoryTerminator, PidSetProvider, ProcessTableConfig,
    ProcessTableProvider, RecordingSleeper,
};
pub use reaper::Reaper;
pub use report::{ReapReport, WaitReport};
pub use terminator::{terminate_all, terminate_raw, SigkillTerminator, Terminator};
