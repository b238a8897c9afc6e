//! Import cutoff
//!
//! The operator names the last calendar day whose samples should come from
//! the old device. Everything recorded after midnight ending that day was
//! already logged by the new device and is excluded from the import.

use crate::archive::error::{ArchiveError, ArchiveResult};
use chrono::{Days, Local, NaiveDate, TimeZone};

/// Latest import timestamp (inclusive) that may be merged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoff(i64);

impl Cutoff {
    /// Keep every row
    pub fn unbounded() -> Self {
        Cutoff(i64::MAX)
    }

    /// Cutoff at an explicit POSIX timestamp
    pub fn at(timestamp: i64) -> Self {
        Cutoff(timestamp)
    }

    /// Parse `YYYY-mm-dd` in local time
    pub fn from_date_str(date: &str) -> ArchiveResult<Self> {
        Self::from_date_str_in(date, &Local)
    }

    /// Parse `YYYY-mm-dd` in the given zone
    pub fn from_date_str_in<Tz: TimeZone>(date: &str, tz: &Tz) -> ArchiveResult<Self> {
        let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| ArchiveError::InvalidDate(date.to_string()))?;
        Self::from_date_in(day, tz).ok_or_else(|| ArchiveError::InvalidDate(date.to_string()))
    }

    /// Midnight at the start of the day after `day`, in `tz`
    pub fn from_date_in<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> Option<Self> {
        let next = day.checked_add_days(Days::new(1))?;
        let midnight = next.and_hms_opt(0, 0, 0)?;
        let instant = tz.from_local_datetime(&midnight).earliest()?;
        Some(Cutoff(instant.timestamp()))
    }

    pub fn timestamp(&self) -> i64 {
        self.0
    }

    /// Whether a sample stamped `timestamp` is retained
    pub fn admits(&self, timestamp: i64) -> bool {
        timestamp <= self.0
    }

    pub fn is_unbounded(&self) -> bool {
        self.0 == i64::MAX
    }
}

impl Default for Cutoff {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl std::fmt::Display for Cutoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unbounded() {
            return write!(f, "unbounded");
        }
        match chrono::DateTime::from_timestamp(self.0, 0) {
            Some(dt) => write!(f, "{} ({})", self.0, dt.format("%Y-%m-%dT%H:%M:%SZ")),
            None => write!(f, "{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_midnight_of_following_day() {
        let cutoff = Cutoff::from_date_str_in("2019-03-09", &Utc).unwrap();
        // 2019-03-10T00:00:00Z
        assert_eq!(cutoff.timestamp(), 1_552_176_000);
        assert!(cutoff.admits(1_552_176_000));
        assert!(!cutoff.admits(1_552_176_001));
    }

    #[test]
    fn test_month_and_year_rollover() {
        let cutoff = Cutoff::from_date_str_in("2018-12-31", &Utc).unwrap();
        // 2019-01-01T00:00:00Z
        assert_eq!(cutoff.timestamp(), 1_546_300_800);
    }

    #[test]
    fn test_zone_offset() {
        let cet = FixedOffset::east_opt(3600).unwrap();
        let cutoff = Cutoff::from_date_str_in("2019-03-09", &cet).unwrap();
        assert_eq!(cutoff.timestamp(), 1_552_176_000 - 3600);
    }

    #[test]
    fn test_invalid_dates() {
        for bad in ["2019-02-30", "09-03-2019", "yesterday", ""] {
            assert!(matches!(
                Cutoff::from_date_str_in(bad, &Utc),
                Err(ArchiveError::InvalidDate(_))
            ));
        }
    }

    #[test]
    fn test_unbounded() {
        let cutoff = Cutoff::default();
        assert!(cutoff.is_unbounded());
        assert!(cutoff.admits(i64::from(i32::MAX)));
        assert_eq!(cutoff.to_string(), "unbounded");
        assert_eq!(Cutoff::at(250).timestamp(), 250);
    }
}
