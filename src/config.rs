use std::{collections::HashMap, env, time::Duration};

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::Serialize;

use crate::clock::{parse_timezone, DEFAULT_TIMEZONE};

/// Process-level settings, read once at startup from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub port: u16,
    pub timezone: Tz,
    pub store_timeout: Duration,
    pub mail_relay_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/turnero.db".to_string());

        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(8080);

        let timezone = match env::var("BUSINESS_TIMEZONE") {
            Ok(name) => parse_timezone(&name)?,
            Err(_) => DEFAULT_TIMEZONE,
        };

        let store_timeout = env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_STORE_TIMEOUT);

        let mail_relay_url = env::var("MAIL_RELAY_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            database_url,
            port,
            timezone,
            store_timeout,
            mail_relay_url,
        })
    }
}

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for slot durations and template intervals.
pub const MAX_SLOT_MINUTES: i64 = 24 * 60;

pub const KEY_BUSINESS_NAME: &str = "business_name";
pub const KEY_BUSINESS_PHONE: &str = "business_phone";
pub const KEY_BUSINESS_EMAIL: &str = "business_email";
pub const KEY_BUSINESS_ADDRESS: &str = "business_address";
pub const KEY_OPEN_TIME: &str = "open_time";
pub const KEY_CLOSE_TIME: &str = "close_time";
pub const KEY_SLOT_DURATION: &str = "slot_duration_minutes";
pub const KEY_WORKING_DAYS: &str = "working_days";
pub const KEY_DISPLAY_CUTOFF: &str = "display_cutoff_minutes";
pub const KEY_BOOKING_LEAD: &str = "booking_lead_minutes";
pub const KEY_BOOKING_HORIZON: &str = "booking_horizon_months";

/// Keys seeded into the configuration table when missing.
pub const DEFAULTS: &[(&str, &str)] = &[
    (KEY_BUSINESS_NAME, "Barbería"),
    (KEY_BUSINESS_PHONE, ""),
    (KEY_BUSINESS_EMAIL, ""),
    (KEY_BUSINESS_ADDRESS, ""),
    (KEY_OPEN_TIME, "09:00"),
    (KEY_CLOSE_TIME, "20:00"),
    (KEY_SLOT_DURATION, "30"),
    (KEY_WORKING_DAYS, "1,2,3,4,5,6"),
    (KEY_DISPLAY_CUTOFF, "180"),
    (KEY_BOOKING_LEAD, "30"),
    (KEY_BOOKING_HORIZON, "2"),
];

/// Business configuration parsed from the key/value configuration table.
///
/// Unknown keys are ignored and unparsable values fall back to their defaults,
/// so a bad admin edit degrades to default behaviour instead of failing every
/// availability query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BusinessSettings {
    pub business_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub slot_duration_minutes: i64,
    /// Weekday indexes, 0 = Sunday.
    pub working_days: Vec<u8>,
    /// Unbooked slots starting sooner than this are hidden from today's list.
    pub display_cutoff_minutes: i64,
    /// Minimum time between now and a slot start for a booking to be accepted.
    pub booking_lead_minutes: i64,
    pub booking_horizon_months: u32,
}

impl Default for BusinessSettings {
    fn default() -> Self {
        Self::from_map(&HashMap::new())
    }
}

impl BusinessSettings {
    pub fn from_map(values: &HashMap<String, String>) -> Self {
        let text = |key: &str| -> String {
            values
                .get(key)
                .cloned()
                .or_else(|| default_value(key).map(str::to_string))
                .unwrap_or_default()
        };
        let number = |key: &str| -> i64 {
            values
                .get(key)
                .and_then(|value| value.trim().parse::<i64>().ok())
                .filter(|value| *value >= 0)
                .or_else(|| default_value(key).and_then(|value| value.parse().ok()))
                .unwrap_or(0)
        };
        let time = |key: &str| -> NaiveTime {
            values
                .get(key)
                .and_then(|value| crate::models::parse_slot_time(value).ok())
                .or_else(|| default_value(key).and_then(|value| crate::models::parse_slot_time(value).ok()))
                .unwrap_or(NaiveTime::MIN)
        };

        let working_days = values
            .get(KEY_WORKING_DAYS)
            .map(|value| parse_working_days(value))
            .filter(|days| !days.is_empty())
            .unwrap_or_else(|| parse_working_days(default_value(KEY_WORKING_DAYS).unwrap_or("")));

        let slot_duration_minutes = match number(KEY_SLOT_DURATION) {
            minutes @ 1..=MAX_SLOT_MINUTES => minutes,
            _ => 30,
        };

        Self {
            business_name: text(KEY_BUSINESS_NAME),
            phone: text(KEY_BUSINESS_PHONE),
            email: text(KEY_BUSINESS_EMAIL),
            address: text(KEY_BUSINESS_ADDRESS),
            open_time: time(KEY_OPEN_TIME),
            close_time: time(KEY_CLOSE_TIME),
            slot_duration_minutes,
            working_days,
            display_cutoff_minutes: number(KEY_DISPLAY_CUTOFF),
            booking_lead_minutes: number(KEY_BOOKING_LEAD),
            booking_horizon_months: number(KEY_BOOKING_HORIZON).clamp(0, 24) as u32,
        }
    }

    pub fn is_working_day(&self, weekday: u8) -> bool {
        self.working_days.contains(&weekday)
    }
}

fn default_value(key: &str) -> Option<&'static str> {
    DEFAULTS
        .iter()
        .find(|(default_key, _)| *default_key == key)
        .map(|(_, value)| *value)
}

/// Parses `"1,2,3"` or `"mon, tue"` style lists into Sunday-based weekday indexes.
pub fn parse_working_days(value: &str) -> Vec<u8> {
    let mut days: Vec<u8> = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            if let Ok(index) = part.parse::<u8>() {
                return (index <= 6).then_some(index);
            }
            part.parse::<Weekday>()
                .ok()
                .map(|weekday| weekday.num_days_from_sunday() as u8)
        })
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_table_yields_defaults() {
        let settings = BusinessSettings::default();
        assert_eq!(settings.slot_duration_minutes, 30);
        assert_eq!(settings.display_cutoff_minutes, 180);
        assert_eq!(settings.booking_lead_minutes, 30);
        assert_eq!(settings.booking_horizon_months, 2);
        assert_eq!(settings.working_days, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(settings.open_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn thresholds_are_independent() {
        let settings = BusinessSettings::from_map(&map(&[
            (KEY_DISPLAY_CUTOFF, "0"),
            (KEY_BOOKING_LEAD, "45"),
        ]));
        assert_eq!(settings.display_cutoff_minutes, 0);
        assert_eq!(settings.booking_lead_minutes, 45);
    }

    #[test]
    fn garbage_values_fall_back() {
        let settings = BusinessSettings::from_map(&map(&[
            (KEY_SLOT_DURATION, "soon"),
            (KEY_BOOKING_LEAD, "-5"),
            (KEY_WORKING_DAYS, "nope"),
        ]));
        assert_eq!(settings.slot_duration_minutes, 30);
        assert_eq!(settings.booking_lead_minutes, 30);
        assert_eq!(settings.working_days, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn oversized_slot_duration_falls_back() {
        let stored = i64::MAX.to_string();
        let settings = BusinessSettings::from_map(&map(&[(KEY_SLOT_DURATION, stored.as_str())]));
        assert_eq!(settings.slot_duration_minutes, 30);

        let settings = BusinessSettings::from_map(&map(&[(KEY_SLOT_DURATION, "1440")]));
        assert_eq!(settings.slot_duration_minutes, 1440);
    }

    #[test]
    fn working_days_accept_numbers_and_names() {
        assert_eq!(parse_working_days("1, 3,5"), vec![1, 3, 5]);
        assert_eq!(parse_working_days("Sunday,sat,7,mon"), vec![0, 1, 6]);
        assert!(parse_working_days("").is_empty());
    }
}
