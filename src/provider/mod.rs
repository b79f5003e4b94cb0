//! Kit pid set providers
//!
//! The convergence poller and the reaper never talk to the process registry
//! of the server under test directly. They go through [`PidSetProvider`],
//! which exposes four read-only queries and nothing else.
//!
//! Two implementations ship with the crate:
//! - [`memory::InMemoryProvider`]: a mutable in-process population for tests
//! - [`process_table::ProcessTableProvider`]: reads the OS process table

pub mod memory;
pub mod process_table;

use crate::core::models::{KitSnapshot, ProcessId};
use crate::core::pid_set::ProcessIdSet;
use crate::error::{KitWardenError, ProviderResult};
use std::sync::Arc;

// Re-export commonly used types
pub use memory::{InMemoryProvider, KitRole, MemoryTerminator, RecordingSleeper};
pub use process_table::{ProcessTableConfig, ProcessTableProvider};

/// Read-only view of the kit population.
///
/// Every call reflects the registry at the instant of the call only. Nothing
/// ties two calls together: a kit can move from spare to document-bound, or
/// die, between `doc_kit_pids()` and `spare_kit_pids()`.
pub trait PidSetProvider: Send + Sync {
    /// Every live kit, spare or document-bound
    fn all_kit_pids(&self) -> ProviderResult<ProcessIdSet>;

    /// Idle kits ready to take a new document
    fn spare_kit_pids(&self) -> ProviderResult<ProcessIdSet>;

    /// Kits currently serving a document
    fn doc_kit_pids(&self) -> ProviderResult<ProcessIdSet>;

    /// Raw pid of the process that spawns kits. Not validated here, see
    /// [`supervisor_process_id`].
    fn supervisor_pid(&self) -> ProviderResult<i64>;
}

impl<P: PidSetProvider + ?Sized> PidSetProvider for Arc<P> {
    fn all_kit_pids(&self) -> ProviderResult<ProcessIdSet> {
        (**self).all_kit_pids()
    }

    fn spare_kit_pids(&self) -> ProviderResult<ProcessIdSet> {
        (**self).spare_kit_pids()
    }

    fn doc_kit_pids(&self) -> ProviderResult<ProcessIdSet> {
        (**self).doc_kit_pids()
    }

    fn supervisor_pid(&self) -> ProviderResult<i64> {
        (**self).supervisor_pid()
    }
}

/// Supervisor pid, asserted to be > 0.
///
/// A non-positive pid means the system under test is broken, so this fails
/// with a precondition violation on the first query instead of retrying.
pub fn supervisor_process_id<P>(provider: &P) -> Result<ProcessId, KitWardenError>
where
    P: PidSetProvider + ?Sized,
{
    let raw = provider.supervisor_pid()?;
    Ok(ProcessId::for_role("supervisor", raw)?)
}

/// Fetch document kits, then spare kits, as two independent reads.
pub fn snapshot<P>(provider: &P) -> ProviderResult<KitSnapshot>
where
    P: PidSetProvider + ?Sized,
{
    let doc = provider.doc_kit_pids()?;
    let spare = provider.spare_kit_pids()?;
    Ok(KitSnapshot::new(doc, spare))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PreconditionViolation, ProviderError};

    #[test]
    fn test_supervisor_process_id_rejects_zero() {
        let provider = InMemoryProvider::new();
        provider.set_supervisor(0);

        let err = supervisor_process_id(&provider).unwrap_err();
        assert!(matches!(
            err,
            KitWardenError::Precondition(PreconditionViolation::InvalidPid {
                role: "supervisor",
                pid: 0
            })
        ));
        assert_eq!(provider.supervisor_queries(), 1);
    }

    #[test]
    fn test_supervisor_process_id_passes_valid_pid() {
        let provider = InMemoryProvider::new();
        provider.set_supervisor(4242);
        assert_eq!(
            supervisor_process_id(&provider).unwrap(),
            ProcessId::new(4242).unwrap()
        );
    }

    #[test]
    fn test_snapshot_through_arc() {
        let provider = InMemoryProvider::new();
        provider.add_doc(ProcessId::new(5).unwrap());
        provider.add_spare(ProcessId::new(6).unwrap());

        let shared: Arc<dyn PidSetProvider> = Arc::new(provider.clone());
        let snap = snapshot(&shared).unwrap();
        assert_eq!(snap.doc.to_raw(), vec![5]);
        assert_eq!(snap.spare.to_raw(), vec![6]);
        assert_eq!(provider.doc_queries(), 1);
        assert_eq!(provider.spare_queries(), 1);
    }

    #[test]
    fn test_provider_errors_convert() {
        let err: KitWardenError = ProviderError::UnsupportedPlatform.into();
        assert!(err.to_string().contains("not supported"));
    }
}
