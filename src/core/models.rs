//! 核心数据模型
//!
//! 进程ID、重试策略、收敛目标与 kit 快照

use crate::core::pid_set::ProcessIdSet;
use crate::error::PreconditionViolation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A live OS process id. Always > 0.
///
/// There is no "no process" value; code that might not have a pid uses
/// `Option<ProcessId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct ProcessId(i32);

impl ProcessId {
    /// Validate a raw kit pid
    pub fn new(raw: i64) -> Result<Self, PreconditionViolation> {
        Self::for_role("kit", raw)
    }

    /// Validate a raw pid, naming its role in the violation message
    pub fn for_role(role: &'static str, raw: i64) -> Result<Self, PreconditionViolation> {
        match i32::try_from(raw) {
            Ok(pid) if pid > 0 => Ok(Self(pid)),
            _ => Err(PreconditionViolation::InvalidPid { role, pid: raw }),
        }
    }

    pub fn as_raw(self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for ProcessId {
    type Error = PreconditionViolation;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<ProcessId> for i32 {
    fn from(pid: ProcessId) -> Self {
        pid.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How long to keep checking and how often.
///
/// The first check runs immediately and a sleep only follows a failed check,
/// so a policy allows `floor(total_timeout / poll_interval) + 1` checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    total_timeout: Duration,
    poll_interval: Duration,
}

impl RetryPolicy {
    pub fn new(total_timeout: Duration, poll_interval: Duration) -> Result<Self, PreconditionViolation> {
        if poll_interval.is_zero() {
            return Err(PreconditionViolation::InvalidPolicy {
                message: "poll interval must be > 0".to_string(),
            });
        }
        if poll_interval > total_timeout {
            return Err(PreconditionViolation::InvalidPolicy {
                message: format!(
                    "poll interval ({}ms) must not exceed the total timeout ({}ms)",
                    poll_interval.as_millis(),
                    total_timeout.as_millis()
                ),
            });
        }
        Ok(Self {
            total_timeout,
            poll_interval,
        })
    }

    pub fn from_millis(total_timeout_ms: u64, poll_interval_ms: u64) -> Result<Self, PreconditionViolation> {
        Self::new(
            Duration::from_millis(total_timeout_ms),
            Duration::from_millis(poll_interval_ms),
        )
    }

    pub fn total_timeout(&self) -> Duration {
        self.total_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Number of checks this policy allows, never less than one.
    pub fn max_attempts(&self) -> u32 {
        let retries = self.total_timeout.as_nanos() / self.poll_interval.as_nanos();
        u32::try_from(retries)
            .unwrap_or(u32::MAX - 1)
            .saturating_add(1)
    }
}

/// Expected kit population shape.
///
/// Document kits must match exactly. Spare kits only need to reach the
/// minimum: a slow system may spawn extras and that is not a failure. An
/// upper bound can be configured for suites that want to catch runaway
/// spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceTarget {
    pub doc_kits: usize,
    pub min_spare_kits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_spare_kits: Option<usize>,
}

impl Default for ConvergenceTarget {
    fn default() -> Self {
        Self {
            doc_kits: 0,
            min_spare_kits: 1,
            max_spare_kits: None,
        }
    }
}

impl ConvergenceTarget {
    pub fn new(doc_kits: usize, min_spare_kits: usize) -> Self {
        Self {
            doc_kits,
            min_spare_kits,
            max_spare_kits: None,
        }
    }

    pub fn with_max_spare_kits(mut self, max_spare_kits: usize) -> Result<Self, PreconditionViolation> {
        self.max_spare_kits = Some(max_spare_kits);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), PreconditionViolation> {
        match self.max_spare_kits {
            Some(max) if max < self.min_spare_kits => Err(PreconditionViolation::InvalidTarget {
                message: format!(
                    "max spare kits ({}) is below min spare kits ({})",
                    max, self.min_spare_kits
                ),
            }),
            _ => Ok(()),
        }
    }

    pub fn doc_satisfied(&self, doc: &ProcessIdSet) -> bool {
        doc.len() == self.doc_kits
    }

    pub fn spare_satisfied(&self, spare: &ProcessIdSet) -> bool {
        spare.len() >= self.min_spare_kits
            && self.max_spare_kits.map_or(true, |max| spare.len() <= max)
    }

    pub fn is_satisfied(&self, snapshot: &KitSnapshot) -> bool {
        self.doc_satisfied(&snapshot.doc) && self.spare_satisfied(&snapshot.spare)
    }

    /// Spare kits above the minimum
    pub fn surplus_spare_kits(&self, snapshot: &KitSnapshot) -> usize {
        snapshot.spare.len().saturating_sub(self.min_spare_kits)
    }

    fn spare_expectation(&self) -> String {
        match self.max_spare_kits {
            Some(max) if max == self.min_spare_kits => max.to_string(),
            Some(max) => format!("{}..={}", self.min_spare_kits, max),
            None => format!(">= {}", self.min_spare_kits),
        }
    }
}

/// Document and spare kit sets as observed by one poll attempt.
///
/// The two sets come from independent provider reads and may reflect
/// slightly different instants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitSnapshot {
    pub doc: ProcessIdSet,
    pub spare: ProcessIdSet,
}

impl KitSnapshot {
    pub fn new(doc: ProcessIdSet, spare: ProcessIdSet) -> Self {
        Self { doc, spare }
    }

    /// `Doc Kits (1, expect: 0): [42], Spare Kits (2, expect: >= 1): [3, 7]`
    pub fn describe(&self, target: Option<&ConvergenceTarget>) -> String {
        match target {
            Some(target) => format!(
                "Doc Kits ({}, expect: {}): {}, Spare Kits ({}, expect: {}): {}",
                self.doc.len(),
                target.doc_kits,
                self.doc,
                self.spare.len(),
                target.spare_expectation(),
                self.spare
            ),
            None => format!(
                "Doc Kits ({}): {}, Spare Kits ({}): {}",
                self.doc.len(),
                self.doc,
                self.spare.len(),
                self.spare
            ),
        }
    }
}
