//! Wall-clock access for timestamping captured lines.

use chrono::{DateTime, Datelike, Utc};

/// Earliest year a synchronized clock can report.
const MIN_SYNCED_YEAR: i32 = 2016;

/// Source of wall-clock time
///
/// Timestamps are only meaningful once the host clock has been synchronized
/// by an external service (NTP/SNTP); `is_synchronized` reports that state.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn is_synchronized(&self) -> bool {
        self.now().year() >= MIN_SYNCED_YEAR
    }
}

/// The host's system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
