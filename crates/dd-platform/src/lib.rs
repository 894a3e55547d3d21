//! DevDriver platform layer
//!
//! This crate provides the OS abstraction the rest of the driver tooling is
//! built on:
//! - Atomic integer operations and a spinning `AtomicLock`
//! - A blocking, non-reentrant `Mutex`
//! - Counting semaphores (in-process and, on unix, cross-process)
//! - Manual-reset events
//! - Threads with a join-with-timeout lifecycle
//! - Process, time and OS queries
//! - Dynamic library loading and a timestamp-seeded random source
//!
//! Every blocking wait reports one of three outcomes: `Ok(())` (success),
//! [`PlatformError::NotReady`] (the timeout elapsed, retry is safe) or another
//! [`PlatformError`] (an unexpected failure).

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod diag;
pub mod fs;
pub mod library;
pub mod memory;
pub mod os_info;
pub mod process;
pub mod random;
pub mod sync;
pub mod thread;

use std::path::PathBuf;

pub use diag::{emit, set_diagnostic_sink, DiagnosticSink, LogSink, Severity};
pub use fs::make_dir;
pub use library::Library;
pub use memory::AlignedBuffer;
pub use os_info::{query_os_info, HostOsInfo, OsInfo, OsInfoProvider, UserInfo};
pub use process::{
    current_time_ms, process_id, process_name, processor_count, query_timestamp,
    query_timestamp_frequency, sleep, ProcessId,
};
pub use random::Random;
pub use sync::{Atomic, Atomic64, AtomicLock, AtomicOps, Event, Mutex, Semaphore};
#[cfg(unix)]
pub use sync::SharedSemaphore;
pub use thread::{thread_naming_supported, Thread, ThreadOptions};

/// Timeout value meaning "wait forever"
pub const INFINITE_TIMEOUT: u32 = u32::MAX;

/// Coarse result categories shared by every operation in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// The operation completed
    Success,
    /// A wait timed out without progress
    NotReady,
    /// An unexpected failure
    Error,
    /// An optional capability is missing on this host
    Unavailable,
    /// A caller-supplied argument was rejected
    InvalidParameter,
    /// A file or directory did not exist
    FileNotFound,
    /// A filesystem operation failed
    FileIoError,
}

/// Platform errors
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The timeout elapsed before the operation could make progress
    #[error("Operation not ready (timed out)")]
    NotReady,

    /// An OS call failed
    #[error("{op} failed: {source}")]
    Os {
        /// Name of the failing call
        op: &'static str,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// A primitive was used incorrectly (double unlock, double start, ...)
    #[error("Usage error: {0}")]
    Usage(&'static str),

    /// Signalling would push a semaphore past its maximum count
    #[error("Semaphore count would exceed its maximum of {max}")]
    LimitExceeded {
        /// Configured maximum count
        max: u32,
    },

    /// A value could not be converted for an OS call
    #[error("Conversion failed: {0}")]
    Conversion(&'static str),

    /// The host does not provide an optional capability
    #[error("Capability unavailable: {0}")]
    Unavailable(&'static str),

    /// An argument was rejected
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// A path component does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A loaded library does not export the requested symbol
    #[error("Symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Requested symbol
        symbol: String,
        /// Library it was looked up in
        library: String,
    },

    /// A filesystem call failed
    #[error("I/O error on {}: {source}", .path.display())]
    FileIo {
        /// Path the operation was applied to
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl PlatformError {
    /// Build an [`PlatformError::Os`] from the calling thread's last OS error
    pub fn last_os_error(op: &'static str) -> Self {
        PlatformError::Os {
            op,
            source: std::io::Error::last_os_error(),
        }
    }

    /// Collapse this error into its [`ResultCode`] category
    pub fn code(&self) -> ResultCode {
        match self {
            PlatformError::NotReady => ResultCode::NotReady,
            PlatformError::Os { .. }
            | PlatformError::Usage(_)
            | PlatformError::Conversion(_)
            | PlatformError::LimitExceeded { .. } => ResultCode::Error,
            PlatformError::Unavailable(_) | PlatformError::SymbolNotFound { .. } => {
                ResultCode::Unavailable
            }
            PlatformError::InvalidParameter(_) => ResultCode::InvalidParameter,
            PlatformError::FileNotFound(_) => ResultCode::FileNotFound,
            PlatformError::FileIo { .. } => ResultCode::FileIoError,
        }
    }

    /// True for a timeout that may be retried
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PlatformError::NotReady)
    }
}

/// Platform operation result
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Collapse any result into its [`ResultCode`]
pub fn result_code<T>(result: &PlatformResult<T>) -> ResultCode {
    match result {
        Ok(_) => ResultCode::Success,
        Err(e) => e.code(),
    }
}
