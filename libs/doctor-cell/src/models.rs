use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc, Weekday};

use shared_database::DbError;
use shared_models::error::AppError;

// ==============================================================================
// CORE AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    #[serde(alias = "monday", alias = "Monday")]
    Monday,
    #[serde(alias = "tuesday", alias = "Tuesday")]
    Tuesday,
    #[serde(alias = "wednesday", alias = "Wednesday")]
    Wednesday,
    #[serde(alias = "thursday", alias = "Thursday")]
    Thursday,
    #[serde(alias = "friday", alias = "Friday")]
    Friday,
    #[serde(alias = "saturday", alias = "Saturday")]
    Saturday,
    #[serde(alias = "sunday", alias = "Sunday")]
    Sunday,
}

impl DayOfWeek {
    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayOfWeek::Monday => write!(f, "MONDAY"),
            DayOfWeek::Tuesday => write!(f, "TUESDAY"),
            DayOfWeek::Wednesday => write!(f, "WEDNESDAY"),
            DayOfWeek::Thursday => write!(f, "THURSDAY"),
            DayOfWeek::Friday => write!(f, "FRIDAY"),
            DayOfWeek::Saturday => write!(f, "SATURDAY"),
            DayOfWeek::Sunday => write!(f, "SUNDAY"),
        }
    }
}

/// A recurring weekly interval in which a doctor takes appointments,
/// cut into fixed-length slots starting at `start_time`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn seconds_of(time: NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64
}

/// Slot boundaries are whole seconds; `seconds_of` would silently drop the fraction.
pub fn is_whole_second(time: NaiveTime) -> bool {
    time.nanosecond() == 0
}

impl AvailabilityWindow {
    fn slot_seconds(&self) -> i64 {
        self.slot_duration as i64 * 60
    }

    /// Every aligned slot start `t` with `t + slot_duration <= end_time`, ascending.
    pub fn slot_starts(&self) -> Vec<NaiveTime> {
        let step = self.slot_seconds();
        if step <= 0 || !is_whole_second(self.start_time) {
            return Vec::new();
        }

        let end = seconds_of(self.end_time);
        let mut current = seconds_of(self.start_time);
        let mut slots = Vec::new();

        while current + step <= end {
            if let Some(time) = NaiveTime::from_num_seconds_from_midnight_opt(current as u32, 0) {
                slots.push(time);
            }
            current += step;
        }

        slots
    }

    /// Whether `[time, time + slot_duration)` lies inside the window on a slot boundary.
    pub fn fits(&self, time: NaiveTime) -> bool {
        let step = self.slot_seconds();
        if step <= 0 || !is_whole_second(time) || !is_whole_second(self.start_time) {
            return false;
        }

        let start = seconds_of(self.start_time);
        let candidate = seconds_of(time);
        if candidate < start || candidate + step > seconds_of(self.end_time) {
            return false;
        }

        (candidate - start) % step == 0
    }

    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        start < self.end_time && end > self.start_time
    }
}

/// Values for a window that has not been stored yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAvailabilityWindow {
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration: i32,
    pub is_active: bool,
}

impl NewAvailabilityWindow {
    pub fn into_window(self, id: Uuid, created_at: DateTime<Utc>) -> AvailabilityWindow {
        AvailabilityWindow {
            id,
            doctor_id: self.doctor_id,
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            slot_duration: self.slot_duration,
            is_active: self.is_active,
            created_at,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub doctor_id: Option<Uuid>,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub day_of_week: Option<DayOfWeek>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableSlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivationResponse {
    pub doctor_id: Uuid,
    pub windows_deactivated: u64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Invalid availability range: {0}")]
    InvalidRange(String),

    #[error("Availability overlaps with existing schedule")]
    Overlap,

    #[error("{0}")]
    NotAvailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<AvailabilityError> for AppError {
    fn from(error: AvailabilityError) -> Self {
        match error {
            AvailabilityError::InvalidRange(msg) => AppError::ValidationError(msg),
            AvailabilityError::Overlap => {
                AppError::ValidationError("Availability overlaps with existing schedule".to_string())
            }
            AvailabilityError::NotAvailable(msg) => AppError::ValidationError(msg),
            AvailabilityError::Validation(msg) => AppError::ValidationError(msg),
            AvailabilityError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
            AvailabilityError::Unauthorized(msg) => AppError::Forbidden(msg),
            AvailabilityError::Database(db) => db.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: (u32, u32), end: (u32, u32), slot: i32) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            day_of_week: DayOfWeek::Monday,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            slot_duration: slot,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn day_of_week_follows_calendar() {
        // 2024-01-01 was a Monday
        assert_eq!(DayOfWeek::of(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), DayOfWeek::Monday);
        assert_eq!(DayOfWeek::of(NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()), DayOfWeek::Sunday);
        assert!(DayOfWeek::Monday < DayOfWeek::Sunday);
    }

    #[test]
    fn day_of_week_wire_format() {
        assert_eq!(serde_json::to_string(&DayOfWeek::Friday).unwrap(), "\"FRIDAY\"");
        let parsed: DayOfWeek = serde_json::from_str("\"friday\"").unwrap();
        assert_eq!(parsed, DayOfWeek::Friday);
    }

    #[test]
    fn slot_starts_stop_at_window_end() {
        let w = window((9, 0), (10, 0), 30);
        assert_eq!(w.slot_starts(), vec![t(9, 0), t(9, 30)]);
    }

    #[test]
    fn window_ending_at_midnight_does_not_wrap() {
        let w = AvailabilityWindow {
            end_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            ..window((23, 0), (23, 0), 30)
        };
        assert_eq!(w.slot_starts(), vec![t(23, 0)]);
        assert!(!w.fits(t(23, 30)));
    }

    #[test]
    fn fits_requires_alignment_and_room() {
        let w = window((9, 0), (10, 0), 30);
        assert!(w.fits(t(9, 0)));
        assert!(w.fits(t(9, 30)));
        assert!(!w.fits(t(9, 15)));
        assert!(!w.fits(t(10, 0)));
        assert!(!w.fits(t(8, 30)));
    }

    #[test]
    fn fractional_seconds_never_align() {
        let w = window((9, 0), (10, 0), 30);
        assert!(!w.fits(NaiveTime::from_hms_milli_opt(9, 0, 0, 500).unwrap()));

        let shifted = AvailabilityWindow {
            start_time: NaiveTime::from_hms_milli_opt(8, 59, 59, 500).unwrap(),
            ..w
        };
        assert!(shifted.slot_starts().is_empty());
        assert!(!shifted.fits(t(9, 0)));
    }

    #[test]
    fn overlap_is_half_open() {
        let w = window((9, 0), (10, 0), 30);
        assert!(w.overlaps(t(9, 30), t(11, 0)));
        assert!(!w.overlaps(t(10, 0), t(11, 0)));
        assert!(!w.overlaps(t(8, 0), t(9, 0)));
    }
}
