//! Cross-process counting semaphore (unix)
//!
//! Backed by a named POSIX semaphore. The creating process owns the name and
//! unlinks it on drop; other processes attach with [`SharedSemaphore::open`]
//! while the creator is alive. Signal and wait behave exactly like
//! [`crate::sync::Semaphore`] on both sides of the process boundary.
//!
//! The maximum count is enforced by reading the current value before
//! posting. Two processes signalling concurrently at `max - 1` can both pass
//! that check; POSIX offers no bounded post to close the window. Hosts that
//! cannot report the current value (named semaphores on macOS) cannot enforce
//! the bound at all, so `signal` fails with [`PlatformError::Unavailable`]
//! there instead of posting unchecked.

use crate::diag::{self, Severity};
use crate::sync::wait::WaitStatus;
use crate::{PlatformError, PlatformResult, INFINITE_TIMEOUT};
use std::ffi::CString;
use std::ptr::NonNull;

/// Longest accepted semaphore name, leading slash included
const MAX_NAME_LENGTH: usize = 250;

/// Largest count any host accepts (`SEM_VALUE_MAX` on Linux)
const MAX_VALUE: u32 = i32::MAX as u32;

/// Named, process-shareable counting semaphore
pub struct SharedSemaphore {
    /// Handle returned by `sem_open`
    handle: NonNull<libc::sem_t>,
    /// Normalised name (`/name`)
    name: CString,
    /// Maximum count agreed on by every process using the name
    max_count: u32,
    /// Whether this handle created the name and must unlink it
    owner: bool,
}

// SAFETY: POSIX semaphore operations are thread-safe on a shared handle
unsafe impl Send for SharedSemaphore {}
unsafe impl Sync for SharedSemaphore {}

impl SharedSemaphore {
    /// Create a new named semaphore
    ///
    /// Fails with an OS error if the name already exists.
    pub fn create(name: &str, initial_count: u32, max_count: u32) -> PlatformResult<Self> {
        validate_max_count(max_count)?;
        if initial_count > max_count {
            return Err(PlatformError::InvalidParameter(
                "initial_count exceeds max_count",
            ));
        }

        let name = posix_name(name)?;
        // SAFETY: name is a valid NUL-terminated string; the variadic mode and
        // value arguments are passed at their promoted widths
        let sem = unsafe {
            libc::sem_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
                initial_count as libc::c_uint,
            )
        };
        Self::from_raw(sem, name, max_count, true)
    }

    /// Attach to a semaphore created by this or another process
    pub fn open(name: &str, max_count: u32) -> PlatformResult<Self> {
        validate_max_count(max_count)?;
        let name = posix_name(name)?;
        // SAFETY: name is a valid NUL-terminated string
        let sem = unsafe { libc::sem_open(name.as_ptr(), 0) };
        Self::from_raw(sem, name, max_count, false)
    }

    fn from_raw(
        sem: *mut libc::sem_t,
        name: CString,
        max_count: u32,
        owner: bool,
    ) -> PlatformResult<Self> {
        if sem == libc::SEM_FAILED {
            return Err(PlatformError::last_os_error("sem_open"));
        }
        let handle = NonNull::new(sem).ok_or(PlatformError::Usage("sem_open returned null"))?;
        Ok(Self {
            handle,
            name,
            max_count,
            owner,
        })
    }

    /// Open a second, independently owned handle to the same semaphore
    ///
    /// The duplicate does not own the name.
    pub fn duplicate(&self) -> PlatformResult<SharedSemaphore> {
        // SAFETY: self.name is a valid NUL-terminated string
        let sem = unsafe { libc::sem_open(self.name.as_ptr(), 0) };
        Self::from_raw(sem, self.name.clone(), self.max_count, false)
    }

    /// Release one unit
    ///
    /// Returns [`PlatformError::LimitExceeded`] at the maximum count, and
    /// the [`SharedSemaphore::value`] error when the count cannot be read.
    /// Nothing is posted in either case.
    pub fn signal(&self) -> PlatformResult<()> {
        check_bound(self.value(), self.max_count)?;

        // SAFETY: handle is a live semaphore from sem_open
        if unsafe { libc::sem_post(self.handle.as_ptr()) } != 0 {
            return Err(PlatformError::last_os_error("sem_post"));
        }
        Ok(())
    }

    /// Take one unit, blocking up to `timeout_ms`
    pub fn wait(&self, timeout_ms: u32) -> PlatformResult<()> {
        let status = match timeout_ms {
            0 => self.try_take(),
            INFINITE_TIMEOUT => self.take_blocking(),
            _ => self.take_until(timeout_ms),
        };
        status.into_result()
    }

    /// Current count
    ///
    /// Returns [`PlatformError::Unavailable`] where the host cannot report
    /// it.
    pub fn value(&self) -> PlatformResult<u32> {
        let mut value: libc::c_int = 0;
        // SAFETY: handle is a live semaphore; value is a valid out pointer
        if unsafe { libc::sem_getvalue(self.handle.as_ptr(), &mut value) } != 0 {
            return Err(PlatformError::Unavailable("sem_getvalue"));
        }
        Ok(value.max(0) as u32)
    }

    /// Get the maximum number of units
    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    /// Get the semaphore's name as seen by other processes
    pub fn name(&self) -> &str {
        self.name.to_str().unwrap_or_default()
    }

    fn try_take(&self) -> WaitStatus {
        loop {
            // SAFETY: handle is a live semaphore
            if unsafe { libc::sem_trywait(self.handle.as_ptr()) } == 0 {
                return WaitStatus::Success;
            }
            match last_errno() {
                libc::EINTR => continue,
                libc::EAGAIN => return WaitStatus::NotReady,
                _ => return WaitStatus::Error(PlatformError::last_os_error("sem_trywait")),
            }
        }
    }

    fn take_blocking(&self) -> WaitStatus {
        loop {
            // SAFETY: handle is a live semaphore
            if unsafe { libc::sem_wait(self.handle.as_ptr()) } == 0 {
                return WaitStatus::Success;
            }
            if last_errno() != libc::EINTR {
                return WaitStatus::Error(PlatformError::last_os_error("sem_wait"));
            }
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    fn take_until(&self, timeout_ms: u32) -> WaitStatus {
        use std::time::{Duration, SystemTime, UNIX_EPOCH};

        // sem_timedwait takes an absolute CLOCK_REALTIME deadline
        let deadline = SystemTime::now() + Duration::from_millis(u64::from(timeout_ms));
        let since_epoch = deadline.duration_since(UNIX_EPOCH).unwrap_or_default();
        // SAFETY: timespec is plain old data
        let mut abs: libc::timespec = unsafe { std::mem::zeroed() };
        abs.tv_sec = since_epoch.as_secs() as libc::time_t;
        abs.tv_nsec = since_epoch.subsec_nanos() as libc::c_long;

        loop {
            // SAFETY: handle is a live semaphore; abs is a valid timespec
            if unsafe { libc::sem_timedwait(self.handle.as_ptr(), &abs) } == 0 {
                return WaitStatus::Success;
            }
            match last_errno() {
                libc::EINTR => continue,
                libc::ETIMEDOUT => return WaitStatus::NotReady,
                _ => return WaitStatus::Error(PlatformError::last_os_error("sem_timedwait")),
            }
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    fn take_until(&self, timeout_ms: u32) -> WaitStatus {
        use std::time::{Duration, Instant};

        // No sem_timedwait on this host; poll with a short sleep
        let deadline = crate::sync::wait::deadline(timeout_ms);
        loop {
            match self.try_take() {
                WaitStatus::NotReady => {}
                status => return status,
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return WaitStatus::NotReady;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Drop for SharedSemaphore {
    fn drop(&mut self) {
        // SAFETY: handle came from sem_open and is closed exactly once
        let closed = unsafe { libc::sem_close(self.handle.as_ptr()) } == 0;
        diag::warn_if(!closed, "Closing a SharedSemaphore handle failed");

        if self.owner {
            // SAFETY: name is a valid NUL-terminated string
            let unlinked = unsafe { libc::sem_unlink(self.name.as_ptr()) } == 0;
            diag::warn_if(!unlinked, "Unlinking a SharedSemaphore name failed");
        }
    }
}

impl std::fmt::Debug for SharedSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSemaphore")
            .field("name", &self.name())
            .field("max_count", &self.max_count)
            .field("owner", &self.owner)
            .finish()
    }
}

fn validate_max_count(max_count: u32) -> PlatformResult<()> {
    if max_count == 0 || max_count > MAX_VALUE {
        return Err(PlatformError::InvalidParameter("max_count out of range"));
    }
    Ok(())
}

/// Decide whether one more unit fits, given the current value
fn check_bound(value: PlatformResult<u32>, max_count: u32) -> PlatformResult<()> {
    match value {
        Ok(value) if value >= max_count => {
            diag::emit(
                Severity::Alert,
                "SharedSemaphore signalled past its maximum count",
            );
            Err(PlatformError::LimitExceeded { max: max_count })
        }
        Ok(_) => Ok(()),
        Err(e) => {
            diag::emit(
                Severity::Error,
                "SharedSemaphore count is unreadable; refusing to signal",
            );
            Err(e)
        }
    }
}

/// Normalise a user-supplied name into POSIX form (`/name`)
fn posix_name(name: &str) -> PlatformResult<CString> {
    let trimmed = name.strip_prefix('/').unwrap_or(name);
    if trimmed.is_empty() || trimmed.contains('/') {
        return Err(PlatformError::InvalidParameter(
            "semaphore name must be a single non-empty path component",
        ));
    }
    if trimmed.len() + 1 > MAX_NAME_LENGTH {
        return Err(PlatformError::InvalidParameter("semaphore name too long"));
    }
    CString::new(format!("/{}", trimmed))
        .map_err(|_| PlatformError::InvalidParameter("semaphore name contains NUL"))
}

fn last_errno() -> libc::c_int {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
