//! 收敛轮询的行为测试
//!
//! Runs the poller against an in-memory kit population with a recording
//! sleeper, so no test here waits on the wall clock.

use kitwarden::{
    ConvergencePoller, ConvergenceTarget, InMemoryProvider, KitWardenError, PreconditionViolation,
    ProcessId, RecordingSleeper, RetryPolicy, TimeoutError,
};
use pretty_assertions::assert_eq;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

/// Collects formatted log output of the current thread
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn capture<R>(&self, body: impl FnOnce() -> R) -> R {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::with_default(subscriber, body)
    }

    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

fn pid(raw: i64) -> ProcessId {
    ProcessId::new(raw).unwrap()
}

fn poller(provider: &InMemoryProvider, sleeper: &Arc<RecordingSleeper>) -> ConvergencePoller<InMemoryProvider> {
    ConvergencePoller::new(Arc::new(provider.clone())).with_sleeper(sleeper.clone())
}

proptest! {
    #[test]
    fn attempts_never_exceed_policy_bound(total in 1u64..2_000, interval in 1u64..500) {
        prop_assume!(interval <= total);
        let policy = RetryPolicy::from_millis(total, interval).unwrap();
        let bound = (total / interval + 1) as usize;

        // Never converges: one doc kit against a target of zero
        let provider = InMemoryProvider::with_supervisor(1);
        provider.add_doc(pid(9));
        let sleeper = Arc::new(RecordingSleeper::new());

        let err = poller(&provider, &sleeper)
            .wait_for_kit_pids_ready(&ConvergenceTarget::default(), &policy)
            .unwrap_err();

        let attempts = err.as_timeout().map(TimeoutError::attempts).unwrap() as usize;
        prop_assert_eq!(attempts, bound);
        prop_assert_eq!(provider.doc_queries(), bound);
        prop_assert_eq!(sleeper.count(), bound - 1);
    }
}

#[test]
fn test_success_on_first_fetch_never_sleeps() {
    let provider = InMemoryProvider::with_supervisor(1);
    provider.add_spare(pid(100));
    let sleeper = Arc::new(RecordingSleeper::new());

    let report = poller(&provider, &sleeper)
        .await_condition(
            "one spare",
            &RetryPolicy::from_millis(1_000, 10).unwrap(),
            |doc, spare| doc.is_empty() && spare.len() == 1,
        )
        .unwrap();

    assert_eq!(report.attempts, 1);
    assert_eq!(sleeper.count(), 0);
    assert_eq!(provider.doc_queries(), 1);
    assert_eq!(provider.spare_queries(), 1);
}

#[test]
fn test_surplus_spares_succeed_with_warning_logged() {
    let provider = InMemoryProvider::with_supervisor(1);
    for raw in 10..14 {
        provider.add_spare(pid(raw));
    }
    let sleeper = Arc::new(RecordingSleeper::new());
    let logs = LogBuffer::default();

    let report = logs
        .capture(|| {
            poller(&provider, &sleeper)
                .wait_for_kit_pids_ready(&ConvergenceTarget::default(), &RetryPolicy::from_millis(100, 10).unwrap())
        })
        .unwrap();

    assert_eq!(report.surplus_spare_kits, 3);
    assert_eq!(report.observed.spare.len(), 4);
    assert_eq!(report.attempts, 1);

    let output = logs.contents();
    let warning = output
        .lines()
        .find(|line| line.contains("WARN"))
        .unwrap_or_else(|| panic!("no warning in:\n{}", output));
    assert!(warning.contains("have 3 more spare kits than wanted; system may be too slow"));
    assert!(warning.contains("surplus=3"));
}

#[test]
fn test_exact_spare_count_logs_no_warning() {
    let provider = InMemoryProvider::with_supervisor(1);
    provider.add_spare(pid(10));
    let sleeper = Arc::new(RecordingSleeper::new());
    let logs = LogBuffer::default();

    logs.capture(|| {
        poller(&provider, &sleeper)
            .wait_for_kit_pids_ready(&ConvergenceTarget::default(), &RetryPolicy::from_millis(100, 10).unwrap())
    })
    .unwrap();

    let output = logs.contents();
    assert!(!output.contains("WARN"), "{}", output);
    assert!(output.contains("spare_count=1"), "{}", output);
}

#[test]
fn test_doc_kit_that_never_closes_times_out_after_eleven_attempts() {
    let provider = InMemoryProvider::with_supervisor(1);
    provider.add_doc(pid(42));
    provider.add_spare(pid(43));

    // Real sleeper: 100ms budget, 10ms cadence
    let poller = ConvergencePoller::new(Arc::new(provider.clone()));
    let err = poller
        .wait_for_kit_pids_ready(&ConvergenceTarget::default(), &RetryPolicy::from_millis(100, 10).unwrap())
        .unwrap_err();

    assert_eq!(provider.doc_queries(), 11);
    match err.as_timeout() {
        Some(TimeoutError::Convergence { attempts, observed, .. }) => {
            assert_eq!(*attempts, 11);
            assert_eq!(observed.doc.to_raw(), vec![42]);
        }
        other => panic!("expected convergence timeout, got {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains("Doc Kits (1, expect: 0)"), "{}", message);
    assert!(err.is_recoverable());
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_invalid_supervisor_fails_without_polling() {
    for raw in [0, -1] {
        let provider = InMemoryProvider::with_supervisor(raw);
        provider.add_spare(pid(5));
        let sleeper = Arc::new(RecordingSleeper::new());

        let err = poller(&provider, &sleeper)
            .wait_for_kit_pids_ready(&ConvergenceTarget::default(), &RetryPolicy::from_millis(100, 10).unwrap())
            .unwrap_err();

        assert!(matches!(
            err,
            KitWardenError::Precondition(PreconditionViolation::InvalidPid {
                role: "supervisor",
                ..
            })
        ));
        assert_eq!(provider.supervisor_queries(), 1);
        assert_eq!(provider.doc_queries(), 0);
        assert_eq!(sleeper.count(), 0);
    }
}

#[test]
fn test_kits_that_change_role_between_attempts() {
    // Starts with a doc kit that closes its document on the second sleep
    let provider = InMemoryProvider::with_supervisor(1);
    provider.add_doc(pid(30));
    let hooked = provider.clone();
    let sleeper = Arc::new(RecordingSleeper::with_hook(move |n| {
        if n == 2 {
            hooked.remove(ProcessId::new(30).unwrap());
            hooked.add_spare(ProcessId::new(31).unwrap());
        }
    }));

    let report = poller(&provider, &sleeper)
        .wait_for_kit_pids_ready(&ConvergenceTarget::default(), &RetryPolicy::from_millis(100, 10).unwrap())
        .unwrap();

    assert_eq!(report.attempts, 3);
    assert_eq!(report.sleeps, 2);
    assert!(report.observed.doc.is_empty());
    assert_eq!(report.observed.spare.to_raw(), vec![31]);
}

#[test]
fn test_upper_bound_on_spares_can_be_configured() {
    let provider = InMemoryProvider::with_supervisor(1);
    for raw in 1..=3 {
        provider.add_spare(pid(raw));
    }
    let target = ConvergenceTarget::new(0, 1).with_max_spare_kits(2).unwrap();
    let sleeper = Arc::new(RecordingSleeper::new());

    let err = poller(&provider, &sleeper)
        .wait_for_kit_pids_ready(&target, &RetryPolicy::from_millis(20, 10).unwrap())
        .unwrap_err();

    assert!(err.to_string().contains("Spare Kits (3, expect: 1..=2)"));
}
