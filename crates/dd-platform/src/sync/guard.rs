//! RAII guards for automatic unlock

use crate::sync::{AtomicLock, Mutex};
use crate::PlatformResult;
use std::marker::PhantomData;

/// RAII guard for [`AtomicLock`] (auto-unlocks on drop)
pub struct AtomicLockGuard<'a> {
    /// Lock held by this guard
    lock: &'a AtomicLock,
    /// Whether the guard has been manually unlocked
    unlocked: bool,
}

impl<'a> AtomicLockGuard<'a> {
    /// The caller must already hold `lock`
    pub(crate) fn new(lock: &'a AtomicLock) -> Self {
        Self {
            lock,
            unlocked: false,
        }
    }

    /// Unlock early, before the guard goes out of scope
    pub fn unlock(mut self) -> PlatformResult<()> {
        self.unlocked = true;
        self.lock.unlock()
    }
}

impl Drop for AtomicLockGuard<'_> {
    fn drop(&mut self) {
        if !self.unlocked {
            // Nothing to propagate to from a destructor
            let _ = self.lock.unlock();
        }
    }
}

/// RAII guard for [`Mutex`] (auto-unlocks on drop)
///
/// The guard is not `Send`: a mutex must be released by the thread that
/// acquired it.
pub struct MutexGuard<'a> {
    /// Mutex held by this guard
    mutex: &'a Mutex,
    /// Whether the guard has been manually unlocked
    unlocked: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> MutexGuard<'a> {
    /// The calling thread must already own `mutex`
    pub(crate) fn new(mutex: &'a Mutex) -> Self {
        Self {
            mutex,
            unlocked: false,
            _not_send: PhantomData,
        }
    }

    /// Unlock early, before the guard goes out of scope
    pub fn unlock(mut self) -> PlatformResult<()> {
        self.unlocked = true;
        self.mutex.unlock()
    }
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        if !self.unlocked {
            let _ = self.mutex.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_lock_guard_manual_unlock() {
        let lock = AtomicLock::new();
        let guard = lock.guard();
        assert!(lock.is_locked());
        guard.unlock().unwrap();
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_mutex_guard_drop() {
        let mutex = Mutex::new();
        {
            let _guard = mutex.guard();
            assert!(mutex.is_locked());
        }
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_mutex_guard_manual_unlock() {
        let mutex = Mutex::new();
        let guard = mutex.guard();
        guard.unlock().unwrap();
        assert!(!mutex.is_locked());

        // Reacquirable after an early unlock
        assert!(mutex.try_lock());
        mutex.unlock().unwrap();
    }
}
