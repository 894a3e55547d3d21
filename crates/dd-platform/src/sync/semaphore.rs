//! Bounded counting semaphore

use crate::diag::{self, Severity};
use crate::sync::wait;
use crate::{PlatformError, PlatformResult};
use parking_lot::{Condvar, Mutex as ParkingLotMutex};
use std::sync::Arc;

/// Counting state shared by every handle to one semaphore
struct SemaphoreState {
    /// Current number of available units
    count: ParkingLotMutex<u32>,
    /// Waiters blocked on a unit becoming available
    available: Condvar,
    /// Maximum number of units (capacity)
    max_count: u32,
}

/// Counting semaphore with a fixed maximum count
///
/// `signal` adds one unit and fails instead of clamping when the count is
/// already at its maximum; `wait` takes one unit, blocking up to a timeout.
///
/// A handle is not `Clone`. [`Semaphore::duplicate`] explicitly creates a
/// second owned handle to the same counter, for handing to another
/// component; see [`crate::sync::SharedSemaphore`] for the cross-process
/// variant.
pub struct Semaphore {
    state: Arc<SemaphoreState>,
}

impl Semaphore {
    /// Create a semaphore holding `initial_count` of at most `max_count`
    /// units
    pub fn new(initial_count: u32, max_count: u32) -> PlatformResult<Self> {
        if max_count == 0 {
            return Err(PlatformError::InvalidParameter("max_count must be non-zero"));
        }
        if initial_count > max_count {
            return Err(PlatformError::InvalidParameter(
                "initial_count exceeds max_count",
            ));
        }

        Ok(Self {
            state: Arc::new(SemaphoreState {
                count: ParkingLotMutex::new(initial_count),
                available: Condvar::new(),
                max_count,
            }),
        })
    }

    /// Release one unit
    ///
    /// Returns [`PlatformError::LimitExceeded`] if the count is already at its
    /// maximum; the count is left unchanged in that case.
    pub fn signal(&self) -> PlatformResult<()> {
        let mut count = self.state.count.lock();
        if *count >= self.state.max_count {
            diag::emit(Severity::Alert, "Semaphore signalled past its maximum count");
            return Err(PlatformError::LimitExceeded {
                max: self.state.max_count,
            });
        }
        *count += 1;
        self.state.available.notify_one();
        Ok(())
    }

    /// Take one unit, blocking up to `timeout_ms`
    ///
    /// Returns [`PlatformError::NotReady`] if no unit became available in
    /// time. A timed-out wait does not change the count.
    pub fn wait(&self, timeout_ms: u32) -> PlatformResult<()> {
        wait::wait_on(&self.state.count, &self.state.available, timeout_ms, |count| {
            if *count > 0 {
                *count -= 1;
                true
            } else {
                false
            }
        })
        .into_result()
    }

    /// Get the current number of available units
    pub fn count(&self) -> u32 {
        *self.state.count.lock()
    }

    /// Get the maximum number of units
    pub fn max_count(&self) -> u32 {
        self.state.max_count
    }

    /// Create another owned handle to the same semaphore
    ///
    /// Both handles observe and modify the same count; the semaphore lives
    /// until the last handle is dropped.
    pub fn duplicate(&self) -> Semaphore {
        Semaphore {
            state: Arc::clone(&self.state),
        }
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("count", &self.count())
            .field("max_count", &self.max_count())
            .finish()
    }
}
