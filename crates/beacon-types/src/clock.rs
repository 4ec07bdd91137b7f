use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};

/// A single source instant: the human-readable form and the grouping
/// millisecond value are taken together, never re-derived from each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockInstant {
    /// Epoch milliseconds, used for grouping and arithmetic.
    pub millis: i64,
    /// Human-readable UTC form (RFC 3339, millisecond precision).
    pub text: String,
}

impl ClockInstant {
    fn live() -> Self {
        let now = Utc::now();
        Self {
            millis: now.timestamp_millis(),
            text: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Time source for record construction.
///
/// Normally every call to [`Clock::now`] yields a fresh instant. A caller
/// that wants a whole batch of records to share one instant freezes the
/// clock with [`Clock::capture`]; the frozen instant is served until the
/// returned guard is dropped.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    captured: Arc<Mutex<Option<ClockInstant>>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current instant: the captured one if a capture is active, otherwise
    /// live time.
    pub fn now(&self) -> ClockInstant {
        let captured = self.captured.lock().expect("clock lock poisoned");
        match captured.as_ref() {
            Some(instant) => instant.clone(),
            None => ClockInstant::live(),
        }
    }

    /// Freeze the clock at the current instant for the lifetime of the
    /// returned guard. A new capture replaces any active one.
    #[must_use = "dropping the guard immediately resumes live time"]
    pub fn capture(&self) -> CaptureGuard {
        let instant = ClockInstant::live();
        *self.captured.lock().expect("clock lock poisoned") = Some(instant);
        CaptureGuard {
            captured: self.captured.clone(),
        }
    }
}

/// Guard for a captured clock instant; dropping it resumes live time.
pub struct CaptureGuard {
    captured: Arc<Mutex<Option<ClockInstant>>>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Ok(mut captured) = self.captured.lock() {
            *captured = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_instants_advance() {
        let clock = Clock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b.millis >= a.millis);
    }

    #[test]
    fn test_capture_freezes_and_release_resumes() {
        let clock = Clock::new();
        let guard = clock.capture();
        let a = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.now();
        assert_eq!(a, b);

        drop(guard);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let c = clock.now();
        assert!(c.millis > a.millis);
    }

    #[test]
    fn test_text_and_millis_share_source() {
        let clock = Clock::new();
        let _guard = clock.capture();
        let instant = clock.now();
        let parsed = chrono::DateTime::parse_from_rfc3339(&instant.text).unwrap();
        assert_eq!(parsed.timestamp_millis(), instant.millis);
    }
}
