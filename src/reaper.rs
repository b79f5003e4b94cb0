//! Kit reaping
//!
//! Kills every kit alive at the start and waits until none of them is left.
//! Only the pids captured before the kill are tracked: replacements that the
//! supervisor spawns in the meantime are expected and never fail the reap.

use crate::convergence::{drive, Attempt, ConvergencePoller, Sleeper};
use crate::core::models::RetryPolicy;
use crate::core::pid_set::ProcessIdSet;
use crate::error::{KitWardenError, TimeoutError};
use crate::provider::PidSetProvider;
use crate::report::{duration_ms, ReapReport};
use crate::terminator::{terminate_all, Terminator};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Last observation of one reap attempt
struct ReapState {
    current: ProcessIdSet,
    survivors: ProcessIdSet,
}

pub struct Reaper<P: PidSetProvider + ?Sized, T: Terminator> {
    poller: ConvergencePoller<P>,
    terminator: T,
}

impl<P: PidSetProvider + ?Sized, T: Terminator> Reaper<P, T> {
    pub fn new(provider: Arc<P>, terminator: T) -> Self {
        Self {
            poller: ConvergencePoller::new(provider),
            terminator,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.poller = self.poller.with_sleeper(sleeper);
        self
    }

    pub fn terminator(&self) -> &T {
        &self.terminator
    }

    /// Kill all kits and wait for every one of them to disappear.
    pub fn reap_all(&self, policy: &RetryPolicy) -> Result<ReapReport, KitWardenError> {
        let started_at = Utc::now();
        let before = self.poller.provider().all_kit_pids()?;

        let kill_requests = terminate_all(&self.terminator, &before);
        info!(
            count = before.len(),
            "Waiting for these kit processes to close: {}", before
        );

        let max_attempts = policy.max_attempts();
        let outcome = drive(self.poller.sleeper(), policy, |attempt| {
            let current = self.poller.provider().all_kit_pids()?;
            let survivors = current.intersection(&before);
            info!(
                attempt,
                max_attempts,
                current_count = current.len(),
                survivor_count = survivors.len(),
                "Current kit processes: {} still alive from before: {}",
                current,
                survivors
            );

            let state = ReapState { current, survivors };
            if state.survivors.is_empty() {
                Ok(Attempt::Done(state))
            } else {
                Ok(Attempt::Pending(state))
            }
        })?;

        let ReapState { current, survivors } = outcome.state;
        info!(
            "Before kit processes: {} current kit processes: {} intersection: {}",
            before, current, survivors
        );

        if !outcome.converged {
            return Err(TimeoutError::Reap {
                attempts: outcome.attempts,
                elapsed: outcome.elapsed,
                before,
                current,
                survivors,
            }
            .into());
        }

        Ok(ReapReport {
            started_at,
            completed_at: Utc::now(),
            attempts: outcome.attempts,
            sleeps: outcome.sleeps,
            elapsed_ms: duration_ms(outcome.elapsed),
            before,
            current,
            kill_requests,
        })
    }
}
