use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 3] = [
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// Whether a booking in this status still holds its slot.
    pub fn occupies_slot(self) -> bool {
        match self {
            BookingStatus::Confirmed | BookingStatus::NoShow => true,
            BookingStatus::Cancelled => false,
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value.trim())
            .ok_or_else(|| AppError::validation(format!("Unknown booking status: {value}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    Manual,
    Vacation,
    Holiday,
    Absence,
}

impl Default for BlockCategory {
    fn default() -> Self {
        BlockCategory::Manual
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Professional {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub color: String,
    pub active: bool,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TemplateSlot {
    pub id: String,
    pub professional_id: String,
    pub weekday: u8,
    pub time: NaiveTime,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OverrideSlot {
    pub id: String,
    pub professional_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub active: bool,
    pub personalized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Block {
    pub id: String,
    pub professional_id: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: String,
    pub category: BlockCategory,
}

impl Block {
    pub fn is_full_day(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    /// The half-open `[start, end)` window of a partial block.
    ///
    /// Rows with only one bound set cannot be created through the API; legacy rows
    /// like that block nothing.
    pub fn range(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn covers(&self, time: NaiveTime) -> bool {
        if self.is_full_day() {
            return true;
        }
        self.range()
            .map(|(start, end)| time >= start && time < end)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Booking {
    pub id: String,
    pub professional_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: String,
    pub service: Option<String>,
    pub notes: Option<String>,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub service: Option<String>,
    pub notes: Option<String>,
}

impl ClientInfo {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("Full name is required.");
        }
        if self.phone.trim().is_empty() {
            errors.push("Phone number is required.");
        } else if !is_valid_phone(&self.phone) {
            errors.push("Phone number is not valid.");
        }
        if !is_valid_email(&self.email) {
            errors.push("A valid email address is required.");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(errors.join(" ")))
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}

fn is_valid_phone(phone: &str) -> bool {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    (10..=13).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Weekday index with Sunday as 0, the numbering used by template rows.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn validate_weekday(weekday: u8) -> Result<u8, AppError> {
    if weekday <= 6 {
        Ok(weekday)
    } else {
        Err(AppError::validation(format!(
            "Weekday must be between 0 (Sunday) and 6 (Saturday), got {weekday}"
        )))
    }
}

/// Parses a time of day as `HH:MM` or `HH:MM:SS`, truncated to the minute.
pub fn parse_slot_time(value: &str) -> Result<NaiveTime, AppError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map(|time| time.with_second(0).unwrap_or(time))
        .map_err(|_| AppError::validation(format!("Invalid time of day: {value}")))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date: {value}")))
}
