//! Time Provider Abstraction
//!
//! Provides a trait-based abstraction for the clock used to stamp the
//! "date modified" column, so copy/paste and create can be tested
//! deterministically.
//!
//! # Examples
//!
//! ```rust
//! use treeview_core::models::time::{TimeProvider, SystemTimeProvider, format_timestamp};
//!
//! let provider = SystemTimeProvider;
//! let stamp = format_timestamp(&provider, "%d/%m/%Y %H:%M:%S");
//! assert_eq!(stamp.len(), 19);
//! ```

use chrono::{DateTime, Local, Utc};

/// Default format of the "date modified" column
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Trait for providing current time
pub trait TimeProvider {
    /// Get the current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// System time provider using actual system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock, for hosts replaying scripted sessions and for tests
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeProvider(pub DateTime<Utc>);

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Format the provider's current time in local time
pub fn format_timestamp(provider: &dyn TimeProvider, format: &str) -> String {
    provider
        .now()
        .with_timezone(&Local)
        .format(format)
        .to_string()
}

/// Mock time provider for testing
///
/// Allows setting a specific time for deterministic tests.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockTimeProvider {
    current_time: DateTime<Utc>,
}

#[cfg(test)]
impl MockTimeProvider {
    /// Create a mock time provider with a specific starting time
    pub fn with_time(time: DateTime<Utc>) -> Self {
        Self { current_time: time }
    }

    /// Advance time by the given duration
    pub fn advance(&mut self, duration: chrono::Duration) {
        self.current_time += duration;
    }
}

#[cfg(test)]
impl TimeProvider for MockTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        self.current_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_system_time_provider() {
        let provider = SystemTimeProvider;
        let now1 = provider.now();
        let now2 = Utc::now();

        // Should be very close (within 1 second)
        assert!((now2 - now1).num_milliseconds().abs() < 1000);
    }

    #[test]
    fn test_mock_time_provider_advance() {
        let start = Utc.with_ymd_and_hms(2025, 1, 3, 9, 30, 0).unwrap();
        let mut provider = MockTimeProvider::with_time(start);

        provider.advance(Duration::hours(2));

        assert_eq!(provider.now() - start, Duration::hours(2));
    }

    #[test]
    fn test_format_timestamp_uses_format() {
        let time = Utc.with_ymd_and_hms(2025, 1, 3, 9, 30, 0).unwrap();
        let provider = FixedTimeProvider(time);

        let expected = time.with_timezone(&Local).format("%Y").to_string();
        assert_eq!(format_timestamp(&provider, "%Y"), expected);
        assert_eq!(format_timestamp(&provider, DEFAULT_TIMESTAMP_FORMAT).len(), 19);
    }
}
