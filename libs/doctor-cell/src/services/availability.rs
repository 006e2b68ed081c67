use std::sync::Arc;

use chrono::NaiveTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{Directory, KeyedLocks};
use shared_models::auth::{Actor, Role};

use crate::models::{
    is_whole_second, seconds_of, AvailabilityError, AvailabilityWindow, CreateAvailabilityRequest,
    DayOfWeek, NewAvailabilityWindow,
};
use crate::services::repository::AvailabilityRepository;

/// Owns the weekly availability template of every doctor.
pub struct AvailabilityService {
    repository: Arc<dyn AvailabilityRepository>,
    directory: Arc<dyn Directory>,
    locks: Arc<KeyedLocks<Uuid>>,
    default_slot_minutes: i32,
}

impl AvailabilityService {
    pub fn new(
        repository: Arc<dyn AvailabilityRepository>,
        directory: Arc<dyn Directory>,
        locks: Arc<KeyedLocks<Uuid>>,
        default_slot_minutes: i32,
    ) -> Self {
        Self {
            repository,
            directory,
            locks,
            default_slot_minutes,
        }
    }

    /// Create a recurring window for a doctor.
    ///
    /// Without `doctor_id` the window belongs to the acting doctor. Creating a
    /// window for someone else requires the admin role.
    pub async fn create_window(
        &self,
        actor: &Actor,
        request: CreateAvailabilityRequest,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        let doctor_id = self.resolve_target_doctor(actor, request.doctor_id)?;
        let slot_duration = request.slot_duration.unwrap_or(self.default_slot_minutes);

        debug!(
            "Creating availability for doctor {} on {} {}-{} ({} min slots)",
            doctor_id, request.day_of_week, request.start_time, request.end_time, slot_duration
        );

        validate_time_range(request.start_time, request.end_time, slot_duration)?;
        self.ensure_doctor_exists(doctor_id).await?;

        let window = NewAvailabilityWindow {
            doctor_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            slot_duration,
            is_active: request.is_active.unwrap_or(true),
        };

        // Overlap check and insert happen under the doctor's lock.
        let _guard = self.locks.acquire(&doctor_id).await;

        if window.is_active {
            let same_day = self
                .repository
                .list_active_for_day(doctor_id, window.day_of_week)
                .await?;
            if same_day
                .iter()
                .any(|existing| existing.overlaps(window.start_time, window.end_time))
            {
                warn!(
                    "Rejected overlapping availability for doctor {} on {}",
                    doctor_id, window.day_of_week
                );
                return Err(AvailabilityError::Overlap);
            }
        }

        let stored = self.repository.insert(window).await?;
        info!(
            "Availability window {} created for doctor {} on {}",
            stored.id, stored.doctor_id, stored.day_of_week
        );
        Ok(stored)
    }

    /// Active windows ordered by day of week, then start time.
    pub async fn list_active_windows(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.ensure_doctor_exists(doctor_id).await?;
        Ok(self.repository.list_active(doctor_id).await?)
    }

    /// Active windows on one weekday, ordered by start time.
    pub async fn list_active_windows_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: DayOfWeek,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.ensure_doctor_exists(doctor_id).await?;
        Ok(self.repository.list_active_for_day(doctor_id, day_of_week).await?)
    }

    /// Deactivate every window of a doctor. Idempotent; used when the doctor account goes away.
    pub async fn deactivate_all(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
    ) -> Result<u64, AvailabilityError> {
        if !actor.is_role(Role::Admin) {
            warn!("Actor {} attempted to deactivate availability of doctor {}", actor.id, doctor_id);
            return Err(AvailabilityError::Unauthorized(
                "Only administrators can deactivate a doctor's availability".to_string(),
            ));
        }

        let _guard = self.locks.acquire(&doctor_id).await;
        let changed = self.repository.deactivate_all(doctor_id).await?;
        info!("Deactivated {} availability windows for doctor {}", changed, doctor_id);
        Ok(changed)
    }

    pub async fn ensure_doctor_exists(&self, doctor_id: Uuid) -> Result<(), AvailabilityError> {
        if self.directory.doctor_exists(doctor_id).await? {
            Ok(())
        } else {
            Err(AvailabilityError::DoctorNotFound)
        }
    }

    fn resolve_target_doctor(
        &self,
        actor: &Actor,
        requested: Option<Uuid>,
    ) -> Result<Uuid, AvailabilityError> {
        match requested {
            Some(doctor_id) if doctor_id == actor.id && actor.is_role(Role::Doctor) => Ok(doctor_id),
            Some(doctor_id) if actor.is_role(Role::Admin) => Ok(doctor_id),
            Some(doctor_id) => {
                warn!("Actor {} attempted to edit availability of doctor {}", actor.id, doctor_id);
                Err(AvailabilityError::Unauthorized(
                    "Not allowed to manage this doctor's availability".to_string(),
                ))
            }
            None if actor.is_role(Role::Doctor) => Ok(actor.id),
            None => Err(AvailabilityError::Validation("Doctor id is required".to_string())),
        }
    }
}

pub fn validate_time_range(
    start: NaiveTime,
    end: NaiveTime,
    slot_minutes: i32,
) -> Result<(), AvailabilityError> {
    if start >= end {
        return Err(AvailabilityError::InvalidRange(
            "Start time must be before end time".to_string(),
        ));
    }
    if !is_whole_second(start) || !is_whole_second(end) {
        return Err(AvailabilityError::InvalidRange(
            "Start and end times must be whole seconds".to_string(),
        ));
    }
    if slot_minutes <= 0 {
        return Err(AvailabilityError::InvalidRange(
            "Slot duration must be greater than 0".to_string(),
        ));
    }

    let total_seconds = seconds_of(end) - seconds_of(start);
    let slot_seconds = slot_minutes as i64 * 60;
    if slot_seconds > total_seconds {
        return Err(AvailabilityError::InvalidRange(
            "Slot duration exceeds available time range".to_string(),
        ));
    }
    if total_seconds % slot_seconds != 0 {
        return Err(AvailabilityError::InvalidRange(
            "Time range must be divisible by slot duration".to_string(),
        ));
    }

    Ok(())
}
