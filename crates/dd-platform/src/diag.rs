//! Diagnostic emission
//!
//! Everything in this crate reports through a single [`emit`] call. By
//! default messages go to the `log` facade under the `dd_platform` target; a
//! host can install its own [`DiagnosticSink`] once at startup.
//!
//! Programmer errors (unlocking an unlocked lock, recursive mutex
//! acquisition) go through [`bug`], which is fatal in debug builds and
//! degrades to a returned [`PlatformError::Usage`] in release builds.

use crate::{PlatformError, PlatformResult};
use once_cell::sync::OnceCell;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Developer-only detail
    Debug,
    /// Chatty progress information
    Verbose,
    /// Normal informational output
    Info,
    /// Something unexpected that the caller can recover from
    Alert,
    /// A failure
    Error,
    /// Must always be shown
    Always,
}

/// Receiver for diagnostic messages
pub trait DiagnosticSink: Send + Sync {
    /// Handle one message
    fn emit(&self, severity: Severity, message: &str);
}

/// Sink that forwards to the `log` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, severity: Severity, message: &str) {
        let level = match severity {
            Severity::Debug => log::Level::Trace,
            Severity::Verbose => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Alert => log::Level::Warn,
            Severity::Error | Severity::Always => log::Level::Error,
        };
        log::log!(target: "dd_platform", level, "{}", message);
    }
}

static SINK: OnceCell<Box<dyn DiagnosticSink>> = OnceCell::new();

/// Install the process-wide diagnostic sink
///
/// Only the first call succeeds; later calls return
/// [`PlatformError::Usage`] and leave the installed sink in place.
pub fn set_diagnostic_sink(sink: Box<dyn DiagnosticSink>) -> PlatformResult<()> {
    SINK.set(sink)
        .map_err(|_| PlatformError::Usage("diagnostic sink already installed"))
}

/// Emit a diagnostic message through the installed sink
pub fn emit(severity: Severity, message: &str) {
    match SINK.get() {
        Some(sink) => sink.emit(severity, message),
        None => LogSink.emit(severity, message),
    }
}

/// Emit an alert when `condition` holds
pub(crate) fn warn_if(condition: bool, message: &str) {
    if condition {
        emit(Severity::Alert, message);
    }
}

/// Signal a programmer error
///
/// Panics in debug builds. In release builds the message is emitted and the
/// returned error is meant to be propagated to the caller.
#[track_caller]
pub(crate) fn bug(message: &'static str) -> PlatformError {
    emit(Severity::Error, message);
    if cfg!(debug_assertions) {
        panic!("{}", message);
    }
    PlatformError::Usage(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingSink {
        messages: Arc<Mutex<Vec<(Severity, String)>>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn emit(&self, severity: Severity, message: &str) {
            self.messages.lock().push((severity, message.to_string()));
        }
    }

    #[test]
    fn test_custom_sink_receives_messages() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            messages: messages.clone(),
        };
        set_diagnostic_sink(Box::new(sink)).unwrap();

        emit(Severity::Info, "sink installed");
        warn_if(true, "condition held");
        warn_if(false, "never emitted");

        let recorded = messages.lock().clone();
        assert!(recorded.contains(&(Severity::Info, "sink installed".to_string())));
        assert!(recorded.contains(&(Severity::Alert, "condition held".to_string())));
        assert!(!recorded.iter().any(|(_, m)| m == "never emitted"));

        // The first sink stays in place
        let second = RecordingSink {
            messages: Arc::new(Mutex::new(Vec::new())),
        };
        assert!(matches!(
            set_diagnostic_sink(Box::new(second)),
            Err(PlatformError::Usage(_))
        ));
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Alert < Severity::Error);
        assert!(Severity::Error < Severity::Always);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "broken invariant")]
    fn test_bug_panics_in_debug() {
        let _ = bug("broken invariant");
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_bug_degrades_in_release() {
        assert!(matches!(
            bug("broken invariant"),
            PlatformError::Usage("broken invariant")
        ));
    }
}
