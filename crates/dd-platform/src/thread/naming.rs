//! Thread naming capability
//!
//! Naming another thread is not available everywhere (older C libraries lack
//! `pthread_setname_np`). The naming function is looked up once, on first
//! use, and cached for the lifetime of the process; callers can query the
//! result with [`thread_naming_supported`].

use crate::{PlatformError, PlatformResult};
use once_cell::sync::Lazy;
use std::ffi::CString;
use std::thread::JoinHandle;

/// Longest OS-level thread name in bytes, terminator excluded
#[cfg(target_os = "linux")]
pub const MAX_THREAD_NAME_BYTES: usize = 15;

/// Longest OS-level thread name in bytes, terminator excluded
#[cfg(not(target_os = "linux"))]
pub const MAX_THREAD_NAME_BYTES: usize = 63;

#[cfg(target_os = "linux")]
type SetNameFn = unsafe extern "C" fn(libc::pthread_t, *const libc::c_char) -> libc::c_int;

#[cfg(not(target_os = "linux"))]
type SetNameFn = fn();

static SET_NAME: Lazy<Option<SetNameFn>> = Lazy::new(probe);

#[cfg(target_os = "linux")]
fn probe() -> Option<SetNameFn> {
    // SAFETY: dlsym with RTLD_DEFAULT and a NUL-terminated symbol name
    let symbol = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c"pthread_setname_np".as_ptr()) };
    if symbol.is_null() {
        return None;
    }
    // SAFETY: pthread_setname_np has exactly this signature in every libc
    // that exports it
    Some(unsafe { std::mem::transmute::<*mut libc::c_void, SetNameFn>(symbol) })
}

#[cfg(not(target_os = "linux"))]
fn probe() -> Option<SetNameFn> {
    None
}

/// Whether this host can name a running thread
pub fn thread_naming_supported() -> bool {
    SET_NAME.is_some()
}

/// Cut `name` to at most `max_bytes` without splitting a character
pub(crate) fn truncate_name(name: &str, max_bytes: usize) -> &str {
    if name.len() <= max_bytes {
        return name;
    }
    let mut end = max_bytes;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Apply `name` to the thread behind `handle`
pub(crate) fn set_thread_name(handle: &JoinHandle<()>, name: &str) -> PlatformResult<()> {
    let set_name = (*SET_NAME).ok_or(PlatformError::Unavailable("thread naming"))?;
    let name = CString::new(truncate_name(name, MAX_THREAD_NAME_BYTES))
        .map_err(|_| PlatformError::Conversion("thread name contains NUL"))?;
    apply(set_name, handle, &name)
}

#[cfg(target_os = "linux")]
fn apply(set_name: SetNameFn, handle: &JoinHandle<()>, name: &CString) -> PlatformResult<()> {
    use std::os::unix::thread::JoinHandleExt;

    // SAFETY: the pthread_t belongs to a thread that has not been joined yet
    let rc = unsafe { set_name(handle.as_pthread_t(), name.as_ptr()) };
    if rc != 0 {
        return Err(PlatformError::Os {
            op: "pthread_setname_np",
            source: std::io::Error::from_raw_os_error(rc),
        });
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn apply(_set_name: SetNameFn, _handle: &JoinHandle<()>, _name: &CString) -> PlatformResult<()> {
    Err(PlatformError::Unavailable("thread naming"))
}
