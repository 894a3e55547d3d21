//! Process, time and processor queries

use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

/// OS process identifier
pub type ProcessId = u32;

/// Ticks per second reported by [`query_timestamp_frequency`]
const TIMESTAMP_FREQUENCY: u64 = 1_000_000_000;

/// Monotonic reference point, created on first use
static MONOTONIC_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Get the current process id
pub fn process_id() -> ProcessId {
    std::process::id()
}

/// Get the executable's file name, extension included
///
/// Returns an empty string when the executable path cannot be determined.
pub fn process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

/// Monotonic milliseconds since the first time query in this process
pub fn current_time_ms() -> u64 {
    Instant::now().duration_since(*MONOTONIC_EPOCH).as_millis() as u64
}

/// Ticks per second of [`query_timestamp`]
pub fn query_timestamp_frequency() -> u64 {
    TIMESTAMP_FREQUENCY
}

/// High-resolution monotonic counter (nanosecond ticks)
pub fn query_timestamp() -> u64 {
    Instant::now().duration_since(*MONOTONIC_EPOCH).as_nanos() as u64
}

/// Put the calling thread to sleep for `ms` milliseconds
pub fn sleep(ms: u32) {
    std::thread::sleep(Duration::from_millis(u64::from(ms)));
}

/// Number of logical processors available to this process
pub fn processor_count() -> usize {
    num_cpus::get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_id_matches_std() {
        assert_eq!(process_id(), std::process::id());
        assert_ne!(process_id(), 0);
    }

    #[test]
    fn test_process_name() {
        let name = process_name();
        assert!(!name.is_empty());
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_time_is_monotonic() {
        let first = current_time_ms();
        sleep(5);
        let second = current_time_ms();
        assert!(second >= first + 5);
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(query_timestamp_frequency(), 1_000_000_000);

        let first = query_timestamp();
        sleep(1);
        let second = query_timestamp();
        assert!(second > first);
        // At least one millisecond worth of ticks
        assert!(second - first >= query_timestamp_frequency() / 1000);
    }

    #[test]
    fn test_processor_count() {
        assert!(processor_count() >= 1);
    }
}
