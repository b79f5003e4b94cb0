//! Platform-specific process operations

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::*;

#[cfg(not(unix))]
mod fallback {
    use crate::core::models::ProcessId;
    use crate::error::SignalError;

    pub fn process_alive(_pid: ProcessId) -> bool {
        false
    }

    pub fn send_sigkill(pid: ProcessId) -> Result<(), SignalError> {
        Err(SignalError {
            pid,
            signal: "SIGKILL",
            errno: 0,
            symbol: "UNSUPPORTED".to_string(),
            message: "signals are not supported on this platform".to_string(),
        })
    }
}

#[cfg(not(unix))]
pub use fallback::*;
