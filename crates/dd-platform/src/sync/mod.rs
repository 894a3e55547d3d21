//! Synchronization primitives
//!
//! OS-thread level primitives: atomics, a spinning lock, a blocking mutex,
//! counting semaphores and manual-reset events. None of them is `Clone`;
//! handles that may be shared across contexts expose an explicit
//! `duplicate()` instead.

mod atomic;
mod atomic_lock;
mod event;
mod guard;
mod mutex;
mod semaphore;
#[cfg(unix)]
mod shared_semaphore;
mod wait;

pub use atomic::{Atomic, Atomic64, AtomicOps};
pub use atomic_lock::{acquire_fast_lock, release_fast_lock, AtomicLock};
pub use event::Event;
pub use guard::{AtomicLockGuard, MutexGuard};
pub use mutex::Mutex;
pub use semaphore::Semaphore;
#[cfg(unix)]
pub use shared_semaphore::SharedSemaphore;
pub use wait::WaitStatus;
