//! Business-time source.
//!
//! Every "now" used for slot filtering or booking validation comes from a
//! [`Clock`], which reports civil date-times in the business timezone. The host
//! timezone never leaks in: the system clock reads UTC and converts with
//! `chrono-tz`.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Argentina::Buenos_Aires;

pub trait Clock: Send + Sync {
    /// Current civil date-time in the business timezone.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BusinessClock {
    tz: Tz,
}

impl BusinessClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Default for BusinessClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl Clock for BusinessClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// A clock pinned to one instant. Used by tests and by tooling that replays a day.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| format!("Invalid timezone: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn business_clock_ignores_host_offset() {
        let clock = BusinessClock::default();
        let utc_now = Utc::now();
        let expected = DEFAULT_TIMEZONE
            .from_utc_datetime(&utc_now.naive_utc())
            .naive_local();
        let diff = (clock.now() - expected).num_seconds().abs();
        assert!(diff < 5, "business now drifted by {diff}s");
    }

    #[test]
    fn buenos_aires_is_three_hours_behind_utc() {
        let utc = chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let local = DEFAULT_TIMEZONE.from_utc_datetime(&utc).naive_local();
        assert_eq!(local.date(), chrono::NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(local.hour(), 23);
    }

    #[test]
    fn fixed_clock_today_is_date_of_now() {
        let now = chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert_eq!(FixedClock(now).today(), now.date());
    }

    #[test]
    fn parses_iana_names() {
        assert!(parse_timezone("America/Argentina/Buenos_Aires").is_ok());
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
