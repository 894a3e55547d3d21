//! Spinning lock for very short critical sections
//!
//! The lock word is 0 when unlocked and 1 when locked. Acquisition uses
//! acquire ordering and release uses release ordering, so writes made while
//! holding the lock are visible to the next holder. There is no timeout and
//! no fairness: a contended waiter can starve.

use crate::diag;
use crate::sync::guard::AtomicLockGuard;
use crate::sync::Atomic;
use crate::{PlatformError, PlatformResult};
use crossbeam::utils::{Backoff, CachePadded};
use std::sync::atomic::Ordering;

/// Spin until `word` transitions from 0 to 1
///
/// Works on any bare lock word, for callers that embed the word in their
/// own structures.
pub fn acquire_fast_lock(word: &Atomic) {
    while word
        .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
        .is_err()
    {
        // Spin on plain loads until the holder releases, then retry the CAS
        let backoff = Backoff::new();
        while word.load(Ordering::Relaxed) != 0 {
            backoff.spin();
        }
    }
}

/// Transition `word` from 1 back to 0
///
/// Releasing a word that is not locked returns [`PlatformError::Usage`].
pub fn release_fast_lock(word: &Atomic) -> PlatformResult<()> {
    word.compare_exchange(1, 0, Ordering::Release, Ordering::Relaxed)
        .map(|_| ())
        .map_err(|_| PlatformError::Usage("tried to unlock an already unlocked lock"))
}

/// Busy-wait spinlock
pub struct AtomicLock {
    word: CachePadded<Atomic>,
}

impl AtomicLock {
    /// Create an unlocked lock
    pub const fn new() -> Self {
        Self {
            word: CachePadded::new(Atomic::new(0)),
        }
    }

    /// Spin until the lock is acquired
    pub fn lock(&self) {
        acquire_fast_lock(&self.word);
    }

    /// Acquire the lock if it is free, without spinning
    pub fn try_lock(&self) -> bool {
        self.word
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Release the lock
    ///
    /// Unlocking an unlocked lock is a bug: fatal in debug builds, an error
    /// in release builds.
    pub fn unlock(&self) -> PlatformResult<()> {
        release_fast_lock(&self.word)
            .map_err(|_| diag::bug("Tried to unlock an already unlocked AtomicLock"))
    }

    /// Acquire the lock and return a guard that releases it on drop
    pub fn guard(&self) -> AtomicLockGuard<'_> {
        self.lock();
        AtomicLockGuard::new(self)
    }

    /// Check whether the lock is currently held
    pub fn is_locked(&self) -> bool {
        self.word.load(Ordering::Relaxed) != 0
    }
}

impl Default for AtomicLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AtomicLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::UnsafeCell;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_unlock() {
        let lock = AtomicLock::new();
        assert!(!lock.is_locked());

        lock.lock();
        assert!(lock.is_locked());
        assert!(!lock.try_lock());

        lock.unlock().unwrap();
        assert!(!lock.is_locked());
        assert!(lock.try_lock());
        lock.unlock().unwrap();
    }

    #[test]
    fn test_guard_releases() {
        let lock = AtomicLock::new();
        {
            let _guard = lock.guard();
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_fast_lock_word() {
        let word = Atomic::new(0);
        acquire_fast_lock(&word);
        assert_eq!(word.load(Ordering::SeqCst), 1);
        assert!(release_fast_lock(&word).is_ok());
        assert!(matches!(
            release_fast_lock(&word),
            Err(PlatformError::Usage(_))
        ));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "already unlocked AtomicLock")]
    fn test_double_unlock_panics_in_debug() {
        let lock = AtomicLock::new();
        lock.lock();
        lock.unlock().unwrap();
        let _ = lock.unlock();
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_double_unlock_errors_in_release() {
        let lock = AtomicLock::new();
        lock.lock();
        lock.unlock().unwrap();
        assert!(matches!(lock.unlock(), Err(PlatformError::Usage(_))));
    }

    struct Guarded {
        lock: AtomicLock,
        inside: UnsafeCell<u32>,
        total: UnsafeCell<u64>,
    }

    // SAFETY: the cells are only touched while `lock` is held
    unsafe impl Sync for Guarded {}

    #[test]
    fn test_mutual_exclusion() {
        let shared = Arc::new(Guarded {
            lock: AtomicLock::new(),
            inside: UnsafeCell::new(0),
            total: UnsafeCell::new(0),
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        shared.lock.lock();
                        // SAFETY: the lock is held
                        unsafe {
                            *shared.inside.get() += 1;
                            assert_eq!(*shared.inside.get(), 1);
                            *shared.total.get() += 1;
                            *shared.inside.get() -= 1;
                        }
                        shared.lock.unlock().unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // SAFETY: all workers have been joined
        assert_eq!(unsafe { *shared.total.get() }, 16_000);
    }
}
