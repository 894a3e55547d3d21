//! Blocking, non-reentrant mutex
//!
//! Backed by a raw parking lock. The owning thread is always recorded, so an
//! unlock from any other thread is rejected instead of breaking mutual
//! exclusion. Debug builds additionally keep a lock counter so that
//! recursive acquisition and destroying a held mutex are caught in testing.

use crate::diag::{self, Severity};
use crate::sync::guard::MutexGuard;
use crate::PlatformResult;
use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(debug_assertions)]
use crate::sync::{Atomic, AtomicOps};

/// Blocking mutual-exclusion lock
pub struct Mutex {
    /// Underlying blocking lock
    raw: RawMutex,

    /// Token of the owning thread (0 if unlocked)
    owner: AtomicU64,

    /// Lock count (detects recursive acquisition - always 0 or 1)
    #[cfg(debug_assertions)]
    lock_count: Atomic,
}

impl Mutex {
    /// Create an unlocked mutex
    pub const fn new() -> Self {
        Self {
            raw: RawMutex::INIT,
            owner: AtomicU64::new(0),
            #[cfg(debug_assertions)]
            lock_count: Atomic::new(0),
        }
    }

    /// Block until the calling thread owns the mutex
    ///
    /// Locking a mutex the calling thread already owns is a bug; release
    /// builds report it and then block forever.
    pub fn lock(&self) {
        if self.owner.load(Ordering::Relaxed) == thread_token() {
            let _ = diag::bug("Recursive Mutex::lock from the owning thread");
        }

        self.raw.lock();
        self.mark_acquired();
    }

    /// Acquire the mutex if it is free, without blocking
    pub fn try_lock(&self) -> bool {
        if self.raw.try_lock() {
            self.mark_acquired();
            true
        } else {
            false
        }
    }

    /// Release the mutex
    ///
    /// Unlocking a mutex that is not locked, or that the calling thread does
    /// not own, is a bug. Release builds return [`crate::PlatformError::Usage`]
    /// and leave the mutex untouched.
    pub fn unlock(&self) -> PlatformResult<()> {
        if !self.raw.is_locked() {
            return Err(diag::bug("Tried to unlock an unlocked Mutex"));
        }
        if self.owner.load(Ordering::Relaxed) != thread_token() {
            return Err(diag::bug("Mutex unlocked by a thread that does not own it"));
        }

        self.owner.store(0, Ordering::Relaxed);
        #[cfg(debug_assertions)]
        self.lock_count.decrement();

        // SAFETY: the lock is held by this thread (checked above)
        unsafe { self.raw.unlock() };
        Ok(())
    }

    /// Acquire the mutex and return a guard that releases it on drop
    pub fn guard(&self) -> MutexGuard<'_> {
        self.lock();
        MutexGuard::new(self)
    }

    /// Check whether any thread currently holds the mutex
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    #[inline]
    fn mark_acquired(&self) {
        #[cfg(debug_assertions)]
        {
            if self.lock_count.increment() != 1 {
                let _ = diag::bug("Mutex locked recursively");
            }
        }
        self.owner.store(thread_token(), Ordering::Relaxed);
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        if !self.raw.is_locked() {
            return;
        }
        if cfg!(debug_assertions) && !std::thread::panicking() {
            let _ = diag::bug("Mutex destroyed while locked");
        } else {
            diag::emit(Severity::Alert, "Mutex destroyed while locked");
        }
    }
}

impl std::fmt::Debug for Mutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Per-thread identity used for ownership checks (never 0)
fn thread_token() -> u64 {
    use std::cell::Cell;

    static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

    thread_local! {
        static TOKEN: Cell<u64> = const { Cell::new(0) };
    }

    TOKEN.with(|token| {
        if token.get() == 0 {
            token.set(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
        }
        token.get()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::UnsafeCell;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_mutex_creation() {
        let mutex = Mutex::new();
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_mutex_uncontended_lock_unlock() {
        let mutex = Mutex::new();
        mutex.lock();
        assert!(mutex.is_locked());
        mutex.unlock().unwrap();
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_mutex_try_lock_contended() {
        let mutex = Arc::new(Mutex::new());
        mutex.lock();

        let other = mutex.clone();
        let acquired = thread::spawn(move || other.try_lock()).join().unwrap();
        assert!(!acquired);

        mutex.unlock().unwrap();
    }

    #[test]
    fn test_mutex_blocks_until_released() {
        let mutex = Arc::new(Mutex::new());
        mutex.lock();

        let other = mutex.clone();
        let handle = thread::spawn(move || {
            other.lock();
            other.unlock().unwrap();
        });

        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!handle.is_finished());
        mutex.unlock().unwrap();
        handle.join().unwrap();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Recursive Mutex::lock")]
    fn test_mutex_recursive_lock_panics_in_debug() {
        let mutex = Mutex::new();
        mutex.lock();
        mutex.lock();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unlocked Mutex")]
    fn test_mutex_unlock_unlocked_panics_in_debug() {
        let mutex = Mutex::new();
        let _ = mutex.unlock();
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_mutex_unlock_unlocked_errors_in_release() {
        use crate::PlatformError;

        let mutex = Mutex::new();
        assert!(matches!(mutex.unlock(), Err(PlatformError::Usage(_))));
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_mutex_foreign_unlock_rejected_in_debug() {
        let mutex = Arc::new(Mutex::new());
        mutex.lock();

        let other = mutex.clone();
        let result = thread::spawn(move || other.unlock()).join();
        // The foreign unlock panicked inside the spawned thread
        assert!(result.is_err());
        assert!(mutex.is_locked());

        mutex.unlock().unwrap();
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_mutex_foreign_unlock_rejected_in_release() {
        use crate::PlatformError;

        let mutex = Arc::new(Mutex::new());
        mutex.lock();

        let other = mutex.clone();
        let (unlock_result, acquired) = thread::spawn(move || {
            let result = other.unlock();
            (result, other.try_lock())
        })
        .join()
        .unwrap();

        assert!(matches!(unlock_result, Err(PlatformError::Usage(_))));
        // Still held by this thread, so the other thread could not take it
        assert!(!acquired);
        assert!(mutex.is_locked());

        mutex.unlock().unwrap();
        assert!(!mutex.is_locked());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "destroyed while locked")]
    fn test_mutex_drop_while_locked_panics_in_debug() {
        let mutex = Mutex::new();
        mutex.lock();
        drop(mutex);
    }

    struct Guarded {
        mutex: Mutex,
        inside: UnsafeCell<u32>,
        total: UnsafeCell<u64>,
    }

    // SAFETY: the cells are only touched while `mutex` is held
    unsafe impl Sync for Guarded {}

    #[test]
    fn test_mutex_mutual_exclusion() {
        let shared = Arc::new(Guarded {
            mutex: Mutex::new(),
            inside: UnsafeCell::new(0),
            total: UnsafeCell::new(0),
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        let _guard = shared.mutex.guard();
                        // SAFETY: the mutex is held
                        unsafe {
                            *shared.inside.get() += 1;
                            assert_eq!(*shared.inside.get(), 1);
                            *shared.total.get() += 1;
                            *shared.inside.get() -= 1;
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // SAFETY: all workers have been joined
        assert_eq!(unsafe { *shared.total.get() }, 8_000);
    }
}
