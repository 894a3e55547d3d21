//! Manual-reset event
//!
//! Once signalled, an event stays signalled until [`Event::clear`] is
//! called. A successful wait does not consume the signal, so every waiter
//! blocked at the time of a [`Event::signal`] is released.

use crate::sync::wait;
use crate::PlatformResult;
use parking_lot::{Condvar, Mutex as ParkingLotMutex};

/// Manual-reset boolean signal
pub struct Event {
    /// Current signalled state
    signaled: ParkingLotMutex<bool>,
    /// Waiters blocked on the state becoming signalled
    condvar: Condvar,
}

impl Event {
    /// Create an event in the given initial state
    pub fn new(signaled: bool) -> Self {
        Self {
            signaled: ParkingLotMutex::new(signaled),
            condvar: Condvar::new(),
        }
    }

    /// Set the event and wake every waiter (idempotent)
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_all();
    }

    /// Reset the event (idempotent)
    pub fn clear(&self) {
        *self.signaled.lock() = false;
    }

    /// Block until the event is signalled or `timeout_ms` elapses
    ///
    /// Returns `Ok(())` when signalled and [`crate::PlatformError::NotReady`]
    /// on timeout. The signalled state is left untouched either way.
    pub fn wait(&self, timeout_ms: u32) -> PlatformResult<()> {
        wait::wait_on(&self.signaled, &self.condvar, timeout_ms, |signaled| {
            *signaled
        })
        .into_result()
    }

    /// Current state, without blocking
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new(false)
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}
