use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fmt;

use doctor_cell::models::AvailabilityError;
use shared_database::DbError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[serde(alias = "requested")]
    Requested,
    #[serde(alias = "accepted")]
    Accepted,
    #[serde(alias = "rejected")]
    Rejected,
    #[serde(alias = "cancelled")]
    Cancelled,
    #[serde(alias = "completed")]
    Completed,
}

/// Statuses that hold a slot against new bookings.
pub const BLOCKING_STATUSES: [AppointmentStatus; 3] = [
    AppointmentStatus::Requested,
    AppointmentStatus::Accepted,
    AppointmentStatus::Completed,
];

impl AppointmentStatus {
    pub fn is_blocking(&self) -> bool {
        BLOCKING_STATUSES.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected | AppointmentStatus::Cancelled | AppointmentStatus::Completed
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Requested => write!(f, "REQUESTED"),
            AppointmentStatus::Accepted => write!(f, "ACCEPTED"),
            AppointmentStatus::Rejected => write!(f, "REJECTED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Values for an appointment that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
}

impl NewAppointment {
    pub fn into_appointment(self, id: Uuid, now: DateTime<Utc>) -> Appointment {
        Appointment {
            id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            appointment_date: self.appointment_date,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            reason: self.reason,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Whose appointments an account-removal check looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentOwner {
    Doctor(Uuid),
    Patient(Uuid),
}

impl fmt::Display for AppointmentOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentOwner::Doctor(id) => write!(f, "doctor {}", id),
            AppointmentOwner::Patient(id) => write!(f, "patient {}", id),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    /// Omitted for self-service booking; set by staff booking on a patient's behalf.
    pub patient_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentStatusUpdateRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotsQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub status: Option<AppointmentStatus>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilters {
    pub status: Option<AppointmentStatus>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

/// Zero-based page request with a clamped size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(0),
            size: size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }
}

impl AppointmentSearchQuery {
    pub fn split(self) -> (AppointmentFilters, PageRequest) {
        (
            AppointmentFilters {
                status: self.status,
                doctor_id: self.doctor_id,
                patient_id: self.patient_id,
                date: self.date,
            },
            PageRequest::new(self.page, self.size),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagedResponse<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> PagedResponse<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = request.size as u64;
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages: total_elements.div_ceil(size),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorRemovalReport {
    pub doctor_id: Uuid,
    pub windows_deactivated: u64,
    pub blocking_appointments: u64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("{0}")]
    SlotNotAvailable(String),

    #[error("End time must be {expected} for this slot")]
    EndTimeMismatch { expected: NaiveTime },

    #[error("Slot is already booked")]
    ConflictDetected,

    #[error("Appointment cannot be {action} in status {status}")]
    InvalidStatusTransition {
        status: AppointmentStatus,
        action: &'static str,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<AvailabilityError> for AppointmentError {
    fn from(error: AvailabilityError) -> Self {
        match error {
            AvailabilityError::NotAvailable(msg) => AppointmentError::SlotNotAvailable(msg),
            AvailabilityError::DoctorNotFound => AppointmentError::DoctorNotFound,
            AvailabilityError::Unauthorized(msg) => AppointmentError::Unauthorized(msg),
            AvailabilityError::Database(db) => AppointmentError::Database(db),
            other => AppointmentError::ValidationError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
            AppointmentError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
            AppointmentError::ConflictDetected => AppError::Conflict("Slot is already booked".to_string()),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            AppointmentError::Database(DbError::UniqueViolation(_)) => {
                AppError::Conflict("Slot is already booked".to_string())
            }
            AppointmentError::Database(db) => db.into(),
            other => AppError::ValidationError(other.to_string()),
        }
    }
}
