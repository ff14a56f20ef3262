//! Utility functions and types.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A poll deadline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// Wait for at most the specified duration.
    After(Duration),
    /// Block forever.
    Never,
}

impl Timeout {
    /// Converts a timeout to the broker protocol's millisecond
    /// representation, where -1 means block forever.
    pub fn as_millis(&self) -> i32 {
        match self {
            Timeout::After(d) => duration_to_millis(*d).min(i32::MAX as u64) as i32,
            Timeout::Never => -1,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Timeout {
        Timeout::After(d)
    }
}

impl<T: Into<Timeout>> From<Option<T>> for Timeout {
    fn from(v: Option<T>) -> Timeout {
        match v {
            None => Timeout::Never,
            Some(v) => v.into(),
        }
    }
}

/// Converts a `Duration` into milliseconds.
pub fn duration_to_millis(duration: Duration) -> u64 {
    duration.as_secs() * 1000 + u64::from(duration.subsec_nanos()) / 1_000_000
}

/// Converts the given time to milliseconds since the unix epoch.
pub fn millis_to_epoch(time: SystemTime) -> i64 {
    duration_to_millis(
        time.duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0)),
    ) as i64
}

/// Returns the current time in milliseconds since the unix epoch.
pub fn current_time_millis() -> i64 {
    millis_to_epoch(SystemTime::now())
}

/// Locks a mutex, recovering the guard if a panicking thread poisoned it.
pub(crate) fn lock_poisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
