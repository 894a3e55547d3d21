//! Wait result normalisation
//!
//! Every blocking wait in this crate, whatever primitive backs it, reports
//! one of three outcomes. Backends with finer-grained failure detail map it
//! into [`WaitStatus::Error`] here.

use crate::diag::{self, Severity};
use crate::{PlatformError, PlatformResult, INFINITE_TIMEOUT};
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Outcome of a blocking wait
#[derive(Debug)]
pub enum WaitStatus {
    /// The awaited condition was observed
    Success,
    /// The timeout elapsed; the waited-on state is unchanged
    NotReady,
    /// The wait failed
    Error(PlatformError),
}

impl WaitStatus {
    /// Convert into the crate-wide result type
    ///
    /// Failures are reported through the diagnostic sink before being
    /// returned.
    pub fn into_result(self) -> PlatformResult<()> {
        match self {
            WaitStatus::Success => Ok(()),
            WaitStatus::NotReady => Err(PlatformError::NotReady),
            WaitStatus::Error(e) => {
                diag::emit(Severity::Always, &format!("wait failed: {}", e));
                Err(e)
            }
        }
    }

    /// True if the wait succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, WaitStatus::Success)
    }
}

/// Absolute deadline for a millisecond timeout, `None` meaning forever
pub(crate) fn deadline(timeout_ms: u32) -> Option<Instant> {
    if timeout_ms == INFINITE_TIMEOUT {
        return None;
    }
    Instant::now().checked_add(Duration::from_millis(u64::from(timeout_ms)))
}

/// Block on `condvar` until `try_take` accepts the guarded state or the
/// timeout elapses
///
/// `try_take` runs with the lock held and is responsible for consuming
/// whatever it observed (a semaphore unit, for instance). A zero timeout
/// polls exactly once without blocking.
pub(crate) fn wait_on<T>(
    state: &Mutex<T>,
    condvar: &Condvar,
    timeout_ms: u32,
    mut try_take: impl FnMut(&mut T) -> bool,
) -> WaitStatus {
    let mut guard = state.lock();
    if try_take(&mut guard) {
        return WaitStatus::Success;
    }
    if timeout_ms == 0 {
        return WaitStatus::NotReady;
    }

    let deadline = deadline(timeout_ms);
    loop {
        match deadline {
            Some(deadline) => {
                let timed_out = condvar.wait_until(&mut guard, deadline).timed_out();
                // The condition may have been met right at the deadline
                if try_take(&mut guard) {
                    return WaitStatus::Success;
                }
                if timed_out {
                    return WaitStatus::NotReady;
                }
            }
            None => {
                condvar.wait(&mut guard);
                if try_take(&mut guard) {
                    return WaitStatus::Success;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_timeout_polls_once() {
        let state = Mutex::new(false);
        let condvar = Condvar::new();
        let mut calls = 0;
        let status = wait_on(&state, &condvar, 0, |ready| {
            calls += 1;
            *ready
        });
        assert!(matches!(status, WaitStatus::NotReady));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_timeout_elapses() {
        let state = Mutex::new(false);
        let condvar = Condvar::new();
        let start = Instant::now();
        let status = wait_on(&state, &condvar, 20, |ready| *ready);
        assert!(matches!(status, WaitStatus::NotReady));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wakes_on_notify() {
        let shared = Arc::new((Mutex::new(false), Condvar::new()));
        let notifier = shared.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            *notifier.0.lock() = true;
            notifier.1.notify_all();
        });

        let status = wait_on(&shared.0, &shared.1, INFINITE_TIMEOUT, |ready| *ready);
        assert!(status.is_success());
        handle.join().unwrap();
    }

    #[test]
    fn test_deadline() {
        assert!(deadline(INFINITE_TIMEOUT).is_none());
        assert!(deadline(0).is_some());
    }

    #[test]
    fn test_into_result() {
        assert!(WaitStatus::Success.into_result().is_ok());
        assert!(matches!(
            WaitStatus::NotReady.into_result(),
            Err(PlatformError::NotReady)
        ));
        assert!(matches!(
            WaitStatus::Error(PlatformError::Usage("bad handle")).into_result(),
            Err(PlatformError::Usage("bad handle"))
        ));
    }
}
