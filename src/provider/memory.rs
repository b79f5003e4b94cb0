//! In-process kit population
//!
//! A thread-safe, mutable stand-in for the server's process registry. Test
//! harnesses drive it directly (spawn, promote, retire kits) and pair it with
//! [`MemoryTerminator`] and [`RecordingSleeper`] to exercise the poller and the
//! reaper without touching real processes or waiting on real clocks.

use crate::convergence::Sleeper;
use crate::core::models::ProcessId;
use crate::core::pid_set::ProcessIdSet;
use crate::error::ProviderResult;
use crate::provider::PidSetProvider;
use crate::terminator::Terminator;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KitRole {
    Spare,
    Document,
}

#[derive(Debug, Default)]
struct Population {
    kits: DashMap<ProcessId, KitRole>,
    supervisor: AtomicI64,
    all_queries: AtomicUsize,
    spare_queries: AtomicUsize,
    doc_queries: AtomicUsize,
    supervisor_queries: AtomicUsize,
}

/// In-memory [`PidSetProvider`]. Clones share the same population.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    inner: Arc<Population>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_supervisor(raw: i64) -> Self {
        let provider = Self::new();
        provider.set_supervisor(raw);
        provider
    }

    /// Raw on purpose, so tests can plant an invalid supervisor pid.
    pub fn set_supervisor(&self, raw: i64) {
        self.inner.supervisor.store(raw, Ordering::SeqCst);
    }

    pub fn add_spare(&self, pid: ProcessId) {
        self.inner.kits.insert(pid, KitRole::Spare);
    }

    pub fn add_doc(&self, pid: ProcessId) {
        self.inner.kits.insert(pid, KitRole::Document);
    }

    /// Spare kit picks up a document. Returns false if the pid is unknown.
    pub fn promote(&self, pid: ProcessId) -> bool {
        match self.inner.kits.get_mut(&pid) {
            Some(mut role) => {
                *role = KitRole::Document;
                true
            }
            None => false,
        }
    }

    /// Kit exits. Returns false if it was already gone.
    pub fn remove(&self, pid: ProcessId) -> bool {
        self.inner.kits.remove(&pid).is_some()
    }

    pub fn role(&self, pid: ProcessId) -> Option<KitRole> {
        self.inner.kits.get(&pid).map(|entry| *entry.value())
    }

    pub fn clear(&self) {
        self.inner.kits.clear();
    }

    pub fn all_queries(&self) -> usize {
        self.inner.all_queries.load(Ordering::SeqCst)
    }

    pub fn spare_queries(&self) -> usize {
        self.inner.spare_queries.load(Ordering::SeqCst)
    }

    pub fn doc_queries(&self) -> usize {
        self.inner.doc_queries.load(Ordering::SeqCst)
    }

    pub fn supervisor_queries(&self) -> usize {
        self.inner.supervisor_queries.load(Ordering::SeqCst)
    }

    fn collect(&self, role: Option<KitRole>) -> ProcessIdSet {
        self.inner
            .kits
            .iter()
            .filter(|entry| role.map_or(true, |wanted| *entry.value() == wanted))
            .map(|entry| *entry.key())
            .collect()
    }
}

impl PidSetProvider for InMemoryProvider {
    fn all_kit_pids(&self) -> ProviderResult<ProcessIdSet> {
        self.inner.all_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.collect(None))
    }

    fn spare_kit_pids(&self) -> ProviderResult<ProcessIdSet> {
        self.inner.spare_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.collect(Some(KitRole::Spare)))
    }

    fn doc_kit_pids(&self) -> ProviderResult<ProcessIdSet> {
        self.inner.doc_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.collect(Some(KitRole::Document)))
    }

    fn supervisor_pid(&self) -> ProviderResult<i64> {
        self.inner.supervisor_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.supervisor.load(Ordering::SeqCst))
    }
}

/// [`Terminator`] that removes killed kits from an [`InMemoryProvider`].
///
/// Stubborn pids record the kill request but stay in the population, the
/// in-memory equivalent of a process stuck in uninterruptible sleep.
#[derive(Debug, Clone)]
pub struct MemoryTerminator {
    provider: InMemoryProvider,
    stubborn: Arc<Mutex<BTreeSet<ProcessId>>>,
    requests: Arc<Mutex<Vec<ProcessId>>>,
}

impl MemoryTerminator {
    pub fn new(provider: InMemoryProvider) -> Self {
        Self {
            provider,
            stubborn: Arc::new(Mutex::new(BTreeSet::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn make_stubborn(&self, pid: ProcessId) {
        self.stubborn.lock().insert(pid);
    }

    pub fn release(&self, pid: ProcessId) {
        self.stubborn.lock().remove(&pid);
    }

    /// Every pid passed to `terminate`, in call order
    pub fn requests(&self) -> Vec<ProcessId> {
        self.requests.lock().clone()
    }
}

impl Terminator for MemoryTerminator {
    fn terminate(&self, pid: ProcessId) {
        self.requests.lock().push(pid);
        if self.stubborn.lock().contains(&pid) {
            return;
        }
        if !self.provider.remove(pid) {
            warn!(pid = %pid, "kill({}, SIGKILL) failed: ESRCH: No such process", pid);
        }
    }
}

type SleepHook = Box<dyn Fn(usize) + Send + Sync>;

/// [`Sleeper`] that records requested sleeps instead of blocking.
///
/// The optional hook runs on every sleep with the 1-based sleep count, which
/// is the natural place to mutate a provider "between attempts".
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
    hook: Option<SleepHook>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook<F>(hook: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        Self {
            sleeps: Mutex::new(Vec::new()),
            hook: Some(Box::new(hook)),
        }
    }

    pub fn count(&self) -> usize {
        self.sleeps.lock().len()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock();
            sleeps.push(duration);
            sleeps.len()
        };
        if let Some(hook) = &self.hook {
            hook(count);
        }
    }
}

impl fmt::Debug for RecordingSleeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSleeper")
            .field("sleeps", &self.count())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
