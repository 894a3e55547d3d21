//! Dynamic library loading
//!
//! A [`Library`] keeps a shared object loaded for as long as it lives and
//! resolves exported functions from it. Failing to load maps to
//! [`PlatformError::FileNotFound`].

use crate::diag::{self, Severity};
use crate::{PlatformError, PlatformResult};
use std::ffi::CString;
use std::path::PathBuf;

/// Loaded shared library, closed on drop
pub struct Library {
    handle: Option<LibraryHandle>,
    name: String,
}

impl Library {
    /// Load `name` using the host's library search rules
    ///
    /// Loading a library that is already mapped into the process only takes
    /// another reference to it.
    pub fn load(name: &str) -> PlatformResult<Self> {
        if name.is_empty() {
            return Err(PlatformError::InvalidParameter("library name is empty"));
        }
        let c_name =
            CString::new(name).map_err(|_| PlatformError::Conversion("library name contains NUL"))?;

        let handle = LibraryHandle::open(&c_name).map_err(|reason| {
            diag::emit(
                Severity::Verbose,
                &format!("Loading library {} failed: {}", name, reason),
            );
            PlatformError::FileNotFound(PathBuf::from(name))
        })?;

        Ok(Self {
            handle: Some(handle),
            name: name.to_string(),
        })
    }

    /// Resolve the exported function `symbol` as a `T`
    ///
    /// # Safety
    ///
    /// `T` must be a function pointer type matching the export's real
    /// signature, and it must not be called after this library is closed.
    pub unsafe fn get_function<T: Copy>(&self, symbol: &str) -> PlatformResult<T> {
        if std::mem::size_of::<T>() != std::mem::size_of::<*mut std::ffi::c_void>() {
            return Err(PlatformError::InvalidParameter(
                "function type must be pointer sized",
            ));
        }
        let handle = self
            .handle
            .as_ref()
            .ok_or(PlatformError::Usage("library is closed"))?;
        let c_symbol =
            CString::new(symbol).map_err(|_| PlatformError::Conversion("symbol name contains NUL"))?;

        match handle.symbol(&c_symbol) {
            Some(address) => Ok(std::mem::transmute_copy(&address)),
            None => Err(PlatformError::SymbolNotFound {
                symbol: symbol.to_string(),
                library: self.name.clone(),
            }),
        }
    }

    /// Name the library was loaded with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unload now instead of on drop
    pub fn close(mut self) -> PlatformResult<()> {
        self.release()
    }

    fn release(&mut self) -> PlatformResult<()> {
        match self.handle.take() {
            Some(handle) => handle.close(),
            None => Ok(()),
        }
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            diag::emit(
                Severity::Alert,
                &format!("Closing library {} failed: {}", self.name, e),
            );
        }
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name)
            .field("loaded", &self.handle.is_some())
            .finish()
    }
}

#[cfg(unix)]
struct LibraryHandle(std::ptr::NonNull<libc::c_void>);

// SAFETY: dlopen handles may be used and closed from any thread
#[cfg(unix)]
unsafe impl Send for LibraryHandle {}
#[cfg(unix)]
unsafe impl Sync for LibraryHandle {}

#[cfg(unix)]
impl LibraryHandle {
    fn open(name: &CString) -> Result<Self, String> {
        // SAFETY: name is NUL-terminated
        let raw = unsafe { libc::dlopen(name.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        std::ptr::NonNull::new(raw).map(Self).ok_or_else(last_dl_error)
    }

    fn symbol(&self, name: &CString) -> Option<*mut libc::c_void> {
        // SAFETY: the handle is live and name is NUL-terminated
        let address = unsafe { libc::dlsym(self.0.as_ptr(), name.as_ptr()) };
        (!address.is_null()).then_some(address)
    }

    fn close(self) -> PlatformResult<()> {
        // SAFETY: the handle came from dlopen and is closed exactly once
        if unsafe { libc::dlclose(self.0.as_ptr()) } != 0 {
            return Err(PlatformError::Os {
                op: "dlclose",
                source: std::io::Error::other(last_dl_error()),
            });
        }
        Ok(())
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    // SAFETY: dlerror returns null or a NUL-terminated thread-local message
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        "unknown error".to_string()
    } else {
        unsafe { std::ffi::CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(not(unix))]
struct LibraryHandle;

#[cfg(not(unix))]
impl LibraryHandle {
    fn open(_name: &CString) -> Result<Self, String> {
        Err("dynamic loading is not supported on this host".to_string())
    }

    fn symbol(&self, _name: &CString) -> Option<*mut std::ffi::c_void> {
        None
    }

    fn close(self) -> PlatformResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_library() {
        match Library::load("libdd_platform_does_not_exist.so") {
            Err(PlatformError::FileNotFound(path)) => {
                assert_eq!(path, PathBuf::from("libdd_platform_does_not_exist.so"));
            }
            other => panic!("expected FileNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_invalid_names() {
        assert!(matches!(
            Library::load(""),
            Err(PlatformError::InvalidParameter(_))
        ));
        assert!(matches!(
            Library::load("lib\0c"),
            Err(PlatformError::Conversion(_))
        ));
    }

    #[test]
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn test_get_function_from_libc() {
        type GetPid = unsafe extern "C" fn() -> libc::pid_t;

        let library = Library::load("libc.so.6").unwrap();
        assert_eq!(library.name(), "libc.so.6");

        let getpid: GetPid = unsafe { library.get_function("getpid") }.unwrap();
        assert_eq!(unsafe { getpid() } as u32, std::process::id());

        let missing = unsafe { library.get_function::<GetPid>("dd_platform_no_such_symbol") };
        assert!(matches!(
            missing,
            Err(PlatformError::SymbolNotFound { .. })
        ));

        library.close().unwrap();
    }

    #[test]
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn test_get_function_rejects_non_pointer_type() {
        let library = Library::load("libc.so.6").unwrap();
        let result = unsafe { library.get_function::<[u64; 2]>("getpid") };
        assert!(matches!(result, Err(PlatformError::InvalidParameter(_))));
    }
}
