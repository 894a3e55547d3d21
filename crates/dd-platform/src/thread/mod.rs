//! Threads with a join-with-timeout lifecycle
//!
//! A [`Thread`] is created idle. [`Thread::start`] spawns an OS thread that
//! runs the entry function and then signals the thread's completion event;
//! [`Thread::join`] waits on that event (or notices the OS thread already
//! finished), releases the OS handle and returns the object to idle so it can
//! be started again.
//!
//! The completion event is signalled even when the entry function panics:
//! the panic is caught at the thread boundary and reported through the
//! diagnostic sink, so a join never waits on an event nobody will set.

mod naming;

pub use naming::{thread_naming_supported, MAX_THREAD_NAME_BYTES};

use crate::diag::{self, Severity};
use crate::sync::Event;
use crate::{PlatformError, PlatformResult};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self as std_thread, JoinHandle, ThreadId};

/// Entry callback taking the start parameter
pub type ThreadFunction<P> = fn(P);

/// Spawn-time configuration for a [`Thread`]
#[derive(Debug, Clone, Default)]
pub struct ThreadOptions {
    /// Name given to the OS thread at spawn
    pub name: Option<String>,
    /// Stack size in bytes (platform default if `None`)
    pub stack_size: Option<usize>,
}

/// OS thread with an explicit start/join lifecycle
pub struct Thread {
    /// Execution handle (None while idle)
    handle: Option<JoinHandle<()>>,

    /// Signalled by the execution wrapper when the entry function returns
    on_exit: Arc<Event>,

    /// Spawn options applied on every start
    options: ThreadOptions,
}

impl Thread {
    /// Create an idle thread with default options
    pub fn new() -> Self {
        Self::with_options(ThreadOptions::default())
    }

    /// Create an idle thread with the given spawn options
    pub fn with_options(options: ThreadOptions) -> Self {
        Self {
            handle: None,
            on_exit: Arc::new(Event::new(false)),
            options,
        }
    }

    /// Run `entry` on a new OS thread
    ///
    /// Fails without blocking if the thread is already running. `entry` is
    /// invoked exactly once.
    pub fn start<F>(&mut self, entry: F) -> PlatformResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.handle.is_some() {
            diag::emit(
                Severity::Alert,
                "Thread::start called on a thread that is already running",
            );
            return Err(PlatformError::Usage("thread already started"));
        }

        let mut builder = std_thread::Builder::new();
        if let Some(name) = &self.options.name {
            if name.contains('\0') {
                return Err(PlatformError::InvalidParameter("thread name contains NUL"));
            }
            builder = builder.name(name.clone());
        }
        if let Some(stack_size) = self.options.stack_size {
            builder = builder.stack_size(stack_size);
        }

        self.on_exit.clear();
        let on_exit = Arc::clone(&self.on_exit);
        let handle = builder
            .spawn(move || run_entry(entry, &on_exit))
            .map_err(|source| PlatformError::Os {
                op: "thread spawn",
                source,
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Run `entry(param)` on a new OS thread
    ///
    /// A missing entry function is rejected with
    /// [`PlatformError::InvalidParameter`].
    pub fn start_fn<P>(&mut self, entry: Option<ThreadFunction<P>>, param: P) -> PlatformResult<()>
    where
        P: Send + 'static,
    {
        let entry = entry.ok_or(PlatformError::InvalidParameter("thread entry function is null"))?;
        self.start(move || entry(param))
    }

    /// Wait up to `timeout_ms` for the thread to finish, then release it
    ///
    /// Returns [`PlatformError::NotReady`] if the thread is still running when
    /// the timeout elapses; the thread stays joinable and the call can be
    /// retried. Joining an idle thread fails immediately.
    pub fn join(&mut self, timeout_ms: u32) -> PlatformResult<()> {
        let finished = match &self.handle {
            Some(handle) => handle.is_finished(),
            None => {
                diag::emit(
                    Severity::Alert,
                    "Thread::join called on a thread that is not joinable",
                );
                return Err(PlatformError::Usage("thread is not joinable"));
            }
        };

        // An OS thread that already terminated needs no event wait
        if !finished {
            self.on_exit.wait(timeout_ms)?;
        }

        let Some(handle) = self.handle.take() else {
            return Err(PlatformError::Usage("thread is not joinable"));
        };

        // The wrapper has signalled, so this only waits for the OS thread to
        // unwind its last frame
        match handle.join() {
            Ok(()) => {
                self.reset();
                Ok(())
            }
            Err(_) => {
                diag::emit(Severity::Error, "Releasing the thread handle failed");
                Err(PlatformError::Os {
                    op: "thread join",
                    source: std::io::Error::other("thread terminated abnormally"),
                })
            }
        }
    }

    /// Name the running thread
    ///
    /// Best effort: returns [`PlatformError::Unavailable`] when the host has no
    /// naming support. Names longer than [`MAX_THREAD_NAME_BYTES`] are
    /// truncated.
    pub fn set_name(&self, name: &str) -> PlatformResult<()> {
        if !thread_naming_supported() {
            return Err(PlatformError::Unavailable("thread naming"));
        }
        let handle = self
            .handle
            .as_ref()
            .ok_or(PlatformError::Usage("thread is not joinable"))?;
        naming::set_thread_name(handle, name)
    }

    /// Whether an execution handle is currently bound
    pub fn is_joinable(&self) -> bool {
        self.handle.is_some()
    }

    /// Get the running thread's id
    pub fn id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|handle| handle.thread().id())
    }

    /// Return to idle after a successful join
    fn reset(&mut self) {
        self.handle = None;
        self.on_exit.clear();
    }
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        // Dropping the JoinHandle detaches the OS thread
        diag::warn_if(
            self.handle.is_some(),
            "Thread dropped while still joinable; detaching",
        );
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("joinable", &self.is_joinable())
            .field("options", &self.options)
            .finish()
    }
}

/// Execution wrapper: run the entry, contain any panic, signal completion
fn run_entry<F: FnOnce()>(entry: F, on_exit: &Event) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            *s
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.as_str()
        } else {
            "non-string panic payload"
        };
        diag::emit(
            Severity::Error,
            &format!("Thread entry function panicked: {}", message),
        );
    }
    on_exit.signal();
}
