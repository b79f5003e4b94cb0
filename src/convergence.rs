//! Kit population convergence
//!
//! Repeatedly snapshots the kit population through a [`PidSetProvider`] until a
//! predicate holds or the [`RetryPolicy`] budget is spent.
//!
//! Cadence: the first check runs immediately, a sleep of `poll_interval`
//! follows every failed check that still has attempts left, and success
//! returns without sleeping. A policy therefore allows at most
//! `floor(total_timeout / poll_interval) + 1` checks.

use crate::core::models::{ConvergenceTarget, KitSnapshot, RetryPolicy};
use crate::core::pid_set::ProcessIdSet;
use crate::error::{KitWardenError, TimeoutError};
use crate::provider::{self, PidSetProvider};
use crate::report::{duration_ms, WaitReport};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Label used for the standard kit readiness wait
pub const KIT_PIDS_READY: &str = "kit pids ready";

/// Blocks between two attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeper
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Result of one check inside [`drive`]
pub(crate) enum Attempt<S> {
    Done(S),
    Pending(S),
}

/// What [`drive`] saw at its last check
pub(crate) struct Outcome<S> {
    pub state: S,
    pub attempts: u32,
    pub sleeps: u32,
    pub elapsed: Duration,
    pub converged: bool,
}

/// Shared retry loop of the poller and the reaper.
///
/// `check` receives the 1-based attempt number. Errors abort the loop at once.
pub(crate) fn drive<S, F>(
    sleeper: &dyn Sleeper,
    policy: &RetryPolicy,
    mut check: F,
) -> Result<Outcome<S>, KitWardenError>
where
    F: FnMut(u32) -> Result<Attempt<S>, KitWardenError>,
{
    let max_attempts = policy.max_attempts();
    let started = Instant::now();
    let mut sleeps = 0u32;
    let mut attempt = 1u32;

    loop {
        let (state, converged) = match check(attempt)? {
            Attempt::Done(state) => (state, true),
            Attempt::Pending(state) => (state, false),
        };

        if converged || attempt >= max_attempts {
            return Ok(Outcome {
                state,
                attempts: attempt,
                sleeps,
                elapsed: started.elapsed(),
                converged,
            });
        }

        sleeper.sleep(policy.poll_interval());
        sleeps += 1;
        attempt += 1;
    }
}

/// Polls a kit population until it reaches a wanted shape.
pub struct ConvergencePoller<P: PidSetProvider + ?Sized> {
    provider: Arc<P>,
    sleeper: Arc<dyn Sleeper>,
}

impl<P: PidSetProvider + ?Sized> Clone for ConvergencePoller<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            sleeper: Arc::clone(&self.sleeper),
        }
    }
}

impl<P: PidSetProvider + ?Sized> ConvergencePoller<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub(crate) fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    /// Wait until `predicate(doc, spare)` holds.
    ///
    /// The two sets are independent reads and need not partition the
    /// population; predicates should not rely on their sum.
    pub fn await_condition<F>(
        &self,
        label: &str,
        policy: &RetryPolicy,
        predicate: F,
    ) -> Result<WaitReport, KitWardenError>
    where
        F: Fn(&ProcessIdSet, &ProcessIdSet) -> bool,
    {
        self.poll(label, policy, None, |snapshot| {
            predicate(&snapshot.doc, &snapshot.spare)
        })
    }

    /// Wait until exactly `target.doc_kits` document kits and at least
    /// `target.min_spare_kits` spare kits are up.
    ///
    /// The supervisor pid is asserted first: a supervisor pid <= 0 fails at
    /// once with a precondition violation and no snapshot is taken.
    pub fn wait_for_kit_pids_ready(
        &self,
        target: &ConvergenceTarget,
        policy: &RetryPolicy,
    ) -> Result<WaitReport, KitWardenError> {
        target.validate()?;
        let supervisor = provider::supervisor_process_id(self.provider.as_ref())?;

        info!(
            supervisor = %supervisor,
            "Waiting for kit processes to close, with {} spare kit(s)",
            target.min_spare_kits
        );

        let report = self.poll(KIT_PIDS_READY, policy, Some(target), |snapshot| {
            target.is_satisfied(snapshot)
        })?;

        if report.surplus_spare_kits > 0 {
            warn!(
                surplus = report.surplus_spare_kits,
                "Kit processes: have {} more spare kits than wanted; system may be too slow",
                report.surplus_spare_kits
            );
        }

        Ok(report)
    }

    fn poll<F>(
        &self,
        label: &str,
        policy: &RetryPolicy,
        target: Option<&ConvergenceTarget>,
        satisfied: F,
    ) -> Result<WaitReport, KitWardenError>
    where
        F: Fn(&KitSnapshot) -> bool,
    {
        let started_at = Utc::now();
        let max_attempts = policy.max_attempts();

        let outcome = drive(self.sleeper(), policy, |attempt| {
            let snapshot = provider::snapshot(self.provider.as_ref())?;
            match target {
                Some(target) => info!(
                    attempt,
                    max_attempts,
                    doc_count = snapshot.doc.len(),
                    doc_expected = target.doc_kits,
                    spare_count = snapshot.spare.len(),
                    spare_min = target.min_spare_kits,
                    "Current kit processes: {}",
                    snapshot.describe(Some(target))
                ),
                None => info!(
                    attempt,
                    max_attempts,
                    label,
                    doc_count = snapshot.doc.len(),
                    spare_count = snapshot.spare.len(),
                    "Current kit processes: {}",
                    snapshot.describe(None)
                ),
            }

            if satisfied(&snapshot) {
                Ok(Attempt::Done(snapshot))
            } else {
                Ok(Attempt::Pending(snapshot))
            }
        })?;

        if !outcome.converged {
            return Err(TimeoutError::Convergence {
                label: label.to_string(),
                attempts: outcome.attempts,
                elapsed: outcome.elapsed,
                observed: outcome.state,
                target: target.copied(),
            }
            .into());
        }

        let surplus_spare_kits = target.map_or(0, |target| target.surplus_spare_kits(&outcome.state));
        Ok(WaitReport {
            label: label.to_string(),
            started_at,
            completed_at: Utc::now(),
            attempts: outcome.attempts,
            sleeps: outcome.sleeps,
            elapsed_ms: duration_ms(outcome.elapsed),
            observed: outcome.state,
            target: target.copied(),
            surplus_spare_kits,
        })
    }
}

/// Log the current document and spare kit lists in one line.
pub fn log_kit_processes<P>(provider: &P) -> Result<KitSnapshot, KitWardenError>
where
    P: PidSetProvider + ?Sized,
{
    let snapshot = provider::snapshot(provider)?;
    info!(
        doc_count = snapshot.doc.len(),
        spare_count = snapshot.spare.len(),
        "Current kit processes: {}",
        snapshot.describe(None)
    );
    Ok(snapshot)
}
