//! Kit termination
//!
//! Kill requests are fire-and-forget: a failed request is logged as a
//! warning and the batch carries on. Whether the process actually died is
//! established later by polling (see [`crate::reaper`]).

use crate::core::models::ProcessId;
use crate::core::pid_set::ProcessIdSet;
use crate::error::PreconditionViolation;
use crate::platform;
use tracing::{info, warn};

/// Requests forceful termination of a process.
///
/// Implementations must not panic or propagate errors; the pid has already
/// been validated by construction of [`ProcessId`].
pub trait Terminator: Send + Sync {
    fn terminate(&self, pid: ProcessId);
}

/// Sends SIGKILL to the real process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SigkillTerminator;

impl Terminator for SigkillTerminator {
    fn terminate(&self, pid: ProcessId) {
        info!(pid = %pid, "Killing {}", pid);
        if let Err(err) = platform::send_sigkill(pid) {
            warn!(pid = %pid, errno = %err.symbol, "{}", err);
        }
    }
}

/// Terminate a pid that has not been validated yet.
///
/// A pid <= 0 would signal a whole process group (or every process we may
/// signal), so it is rejected before anything is sent.
pub fn terminate_raw<T>(terminator: &T, raw: i64) -> Result<ProcessId, PreconditionViolation>
where
    T: Terminator + ?Sized,
{
    let pid = ProcessId::new(raw)?;
    terminator.terminate(pid);
    Ok(pid)
}

/// Request termination of every member, in ascending pid order.
///
/// Returns the number of requests issued.
pub fn terminate_all<T>(terminator: &T, pids: &ProcessIdSet) -> usize
where
    T: Terminator + ?Sized,
{
    for pid in pids {
        terminator.terminate(*pid);
    }
    pids.len()
}
