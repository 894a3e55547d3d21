//! Host operating system information
//!
//! [`OsInfoProvider`] fills an [`OsInfo`] record on a best-effort basis: every
//! field that could be read is populated even when some other part of the
//! query failed, and the first failure is returned so the caller can decide
//! whether a partial record is good enough.

use crate::PlatformResult;

/// Account the process runs as
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    /// Login name
    pub name: String,
    /// Home directory
    pub home_dir: String,
}

/// Snapshot of the host operating system
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsInfo {
    /// Short OS name (e.g. `Linux`)
    pub name: String,
    /// Release and version details
    pub description: String,
    /// Network host name
    pub hostname: String,
    /// Current user
    pub user: UserInfo,
    /// Physical memory in bytes (0 if unknown)
    pub phys_memory: u64,
    /// Swap space in bytes (0 if unknown)
    pub swap_memory: u64,
}

/// Source of [`OsInfo`] records
pub trait OsInfoProvider {
    /// Populate `info` with whatever this provider can read
    ///
    /// Fields that could be read are written even when an error is returned.
    fn query_os_info(&self, info: &mut OsInfo) -> PlatformResult<()>;
}

/// Provider backed by the running host
#[derive(Debug, Default, Clone, Copy)]
pub struct HostOsInfo;

impl OsInfoProvider for HostOsInfo {
    fn query_os_info(&self, info: &mut OsInfo) -> PlatformResult<()> {
        let mut first_error = None;
        let mut record = |result: PlatformResult<()>| {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        };

        record(host::read_system(info));
        record(host::read_hostname(info));
        record(host::read_user(info));
        record(host::read_memory(info));

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Query the host, returning the record along with its completeness
pub fn query_os_info() -> (OsInfo, PlatformResult<()>) {
    let mut info = OsInfo::default();
    let result = HostOsInfo.query_os_info(&mut info);
    (info, result)
}

#[cfg(unix)]
mod host {
    use super::OsInfo;
    use crate::{PlatformError, PlatformResult};
    use std::ffi::CStr;

    pub(super) fn read_system(info: &mut OsInfo) -> PlatformResult<()> {
        // SAFETY: utsname is plain old data; uname fills every field
        let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
        if unsafe { libc::uname(&mut uts) } != 0 {
            return Err(PlatformError::last_os_error("uname"));
        }

        // SAFETY: uname NUL-terminates all fields
        let field = |ptr: *const libc::c_char| unsafe { CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned();
        info.name = field(uts.sysname.as_ptr());
        info.description = format!(
            "{} {}",
            field(uts.release.as_ptr()),
            field(uts.version.as_ptr())
        );
        Ok(())
    }

    pub(super) fn read_hostname(info: &mut OsInfo) -> PlatformResult<()> {
        let mut buf = [0u8; 256];
        // SAFETY: buf is writable for buf.len() bytes
        let ret = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if ret != 0 {
            return Err(PlatformError::last_os_error("gethostname"));
        }
        // Truncated names are not guaranteed to be terminated
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        info.hostname = String::from_utf8_lossy(&buf[..end]).into_owned();
        Ok(())
    }

    pub(super) fn read_user(info: &mut OsInfo) -> PlatformResult<()> {
        if let Some((name, home_dir)) = passwd_entry() {
            info.user.name = name;
            info.user.home_dir = home_dir;
            return Ok(());
        }

        // No passwd entry (common in containers): fall back to the environment
        info.user.name = std::env::var("USER").unwrap_or_default();
        info.user.home_dir = std::env::var("HOME").unwrap_or_default();
        if info.user.name.is_empty() {
            return Err(PlatformError::Unavailable("current user name"));
        }
        Ok(())
    }

    fn passwd_entry() -> Option<(String, String)> {
        let mut buf = vec![0 as libc::c_char; 1024];
        loop {
            // SAFETY: passwd is plain old data filled by getpwuid_r
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::passwd = std::ptr::null_mut();
            let ret = unsafe {
                libc::getpwuid_r(
                    libc::getuid(),
                    &mut pwd,
                    buf.as_mut_ptr(),
                    buf.len(),
                    &mut result,
                )
            };
            if ret == libc::ERANGE && buf.len() < 64 * 1024 {
                buf.resize(buf.len() * 2, 0);
                continue;
            }
            if ret != 0 || result.is_null() {
                return None;
            }

            let read = |ptr: *const libc::c_char| {
                if ptr.is_null() {
                    String::new()
                } else {
                    // SAFETY: passwd strings point into buf and are NUL-terminated
                    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
                }
            };
            return Some((read(pwd.pw_name), read(pwd.pw_dir)));
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub(super) fn read_memory(info: &mut OsInfo) -> PlatformResult<()> {
        // SAFETY: sysinfo is plain old data filled by the call
        let mut si: libc::sysinfo = unsafe { std::mem::zeroed() };
        if unsafe { libc::sysinfo(&mut si) } != 0 {
            return Err(PlatformError::last_os_error("sysinfo"));
        }
        let unit = u64::from(si.mem_unit);
        info.phys_memory = (si.totalram as u64).saturating_mul(unit);
        info.swap_memory = (si.totalswap as u64).saturating_mul(unit);
        Ok(())
    }

    #[cfg(target_os = "macos")]
    pub(super) fn read_memory(info: &mut OsInfo) -> PlatformResult<()> {
        let mut size: u64 = 0;
        let mut len = std::mem::size_of::<u64>();
        let mib = [libc::CTL_HW, libc::HW_MEMSIZE];
        // SAFETY: size is writable for len bytes
        let ret = unsafe {
            libc::sysctl(
                mib.as_ptr() as *mut _,
                2,
                &mut size as *mut u64 as *mut _,
                &mut len,
                std::ptr::null_mut(),
                0,
            )
        };
        if ret != 0 {
            return Err(PlatformError::last_os_error("sysctl"));
        }
        info.phys_memory = size;
        Ok(())
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
    pub(super) fn read_memory(_info: &mut OsInfo) -> PlatformResult<()> {
        Err(PlatformError::Unavailable("memory totals"))
    }
}

#[cfg(not(unix))]
mod host {
    use super::OsInfo;
    use crate::{PlatformError, PlatformResult};

    pub(super) fn read_system(info: &mut OsInfo) -> PlatformResult<()> {
        info.name = std::env::consts::OS.to_string();
        info.description = std::env::consts::ARCH.to_string();
        Ok(())
    }

    pub(super) fn read_hostname(info: &mut OsInfo) -> PlatformResult<()> {
        info.hostname = std::env::var("COMPUTERNAME")
            .map_err(|_| PlatformError::Unavailable("host name"))?;
        Ok(())
    }

    pub(super) fn read_user(info: &mut OsInfo) -> PlatformResult<()> {
        info.user.home_dir = std::env::var("USERPROFILE").unwrap_or_default();
        info.user.name = std::env::var("USERNAME")
            .map_err(|_| PlatformError::Unavailable("current user name"))?;
        Ok(())
    }

    pub(super) fn read_memory(_info: &mut OsInfo) -> PlatformResult<()> {
        Err(PlatformError::Unavailable("memory totals"))
    }
}

impl OsInfo {
    /// True once the provider filled at least the OS name
    pub fn is_populated(&self) -> bool {
        !self.name.is_empty()
    }
}

impl std::fmt::Display for OsInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) on {} as {}",
            self.name, self.description, self.hostname, self.user.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlatformError;

    /// Provider that fills a fixed record and optionally fails part-way
    struct StubProvider {
        fail_memory: bool,
    }

    impl OsInfoProvider for StubProvider {
        fn query_os_info(&self, info: &mut OsInfo) -> PlatformResult<()> {
            info.name = "StubOS".to_string();
            info.hostname = "stub-host".to_string();
            info.user = UserInfo {
                name: "tester".to_string(),
                home_dir: "/home/tester".to_string(),
            };
            if self.fail_memory {
                return Err(PlatformError::Unavailable("memory totals"));
            }
            info.phys_memory = 16 << 30;
            Ok(())
        }
    }

    #[test]
    fn test_stub_provider_complete() {
        let mut info = OsInfo::default();
        StubProvider { fail_memory: false }
            .query_os_info(&mut info)
            .unwrap();
        assert!(info.is_populated());
        assert_eq!(info.phys_memory, 16 << 30);
        assert_eq!(info.to_string(), "StubOS () on stub-host as tester");
    }

    #[test]
    fn test_partial_population_keeps_fields() {
        let mut info = OsInfo::default();
        let result = StubProvider { fail_memory: true }.query_os_info(&mut info);
        assert!(matches!(result, Err(PlatformError::Unavailable(_))));
        assert_eq!(info.hostname, "stub-host");
        assert_eq!(info.user.name, "tester");
        assert_eq!(info.phys_memory, 0);
    }

    #[test]
    fn test_host_provider_fills_system_fields() {
        let (info, _result) = query_os_info();
        assert!(info.is_populated());
        #[cfg(target_os = "linux")]
        {
            assert_eq!(info.name, "Linux");
            assert!(info.phys_memory > 0);
            assert!(!info.hostname.is_empty());
        }
    }
}
