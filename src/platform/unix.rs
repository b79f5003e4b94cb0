use crate::core::models::ProcessId;
use crate::error::SignalError;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Check if process is alive
///
/// Signal 0 probes for existence without delivering anything. EPERM means
/// the process exists but belongs to someone else.
pub fn process_alive(pid: ProcessId) -> bool {
    match kill(Pid::from_raw(pid.as_raw()), None) {
        Ok(()) => true,
        Err(errno) => errno == Errno::EPERM,
    }
}

/// Send SIGKILL
///
/// Uncatchable, so delivery is the only thing that can fail: ESRCH when the
/// process is already gone, EPERM when we are not allowed to signal it.
pub fn send_sigkill(pid: ProcessId) -> Result<(), SignalError> {
    kill(Pid::from_raw(pid.as_raw()), Signal::SIGKILL).map_err(|errno| signal_error(pid, errno))
}

fn signal_error(pid: ProcessId, errno: Errno) -> SignalError {
    SignalError {
        pid,
        signal: "SIGKILL",
        errno: errno as i32,
        symbol: format!("{:?}", errno),
        message: errno.desc().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        let own = ProcessId::new(i64::from(std::process::id())).unwrap();
        assert!(process_alive(own));
    }

    #[test]
    fn test_signal_error_uses_symbolic_errno() {
        let pid = ProcessId::new(4321).unwrap();
        let err = signal_error(pid, Errno::ESRCH);
        assert_eq!(err.symbol, "ESRCH");
        assert_eq!(err.errno, libc::ESRCH);
        assert_eq!(
            err.to_string(),
            "kill(4321, SIGKILL) failed: ESRCH: No such process"
        );
    }
}
