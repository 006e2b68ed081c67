use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::{is_whole_second, AvailableSlotsResponse};
use doctor_cell::services::SlotGenerator;
use shared_database::{DbError, Directory, KeyedLocks};
use shared_models::auth::{Actor, Role};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    BookAppointmentRequest, NewAppointment, PagedResponse, RescheduleAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{AppointmentLifecycleService, Transition};
use crate::services::repository::AppointmentRepository;

/// Books appointments and drives them through their lifecycle.
///
/// Every check-then-write runs while holding the doctor's lock, so two writers
/// can never both see a slot as free. The storage layer's uniqueness rule on
/// blocking rows backs this up across processes.
pub struct AppointmentBookingService {
    repository: Arc<dyn AppointmentRepository>,
    conflicts: Arc<ConflictDetectionService>,
    slots: Arc<SlotGenerator>,
    directory: Arc<dyn Directory>,
    locks: Arc<KeyedLocks<Uuid>>,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        conflicts: Arc<ConflictDetectionService>,
        slots: Arc<SlotGenerator>,
        directory: Arc<dyn Directory>,
        locks: Arc<KeyedLocks<Uuid>>,
    ) -> Self {
        Self {
            repository,
            conflicts,
            slots,
            directory,
            locks,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    pub async fn book(
        &self,
        actor: &Actor,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = resolve_patient(actor, request.patient_id)?;
        let doctor_id = request.doctor_id;

        debug!(
            "Booking patient {} with doctor {} on {} at {}",
            patient_id, doctor_id, request.appointment_date, request.start_time
        );

        if !self.directory.patient_exists(patient_id).await? {
            return Err(AppointmentError::PatientNotFound);
        }
        if !self.directory.doctor_exists(doctor_id).await? {
            return Err(AppointmentError::DoctorNotFound);
        }

        let _guard = self.locks.acquire(&doctor_id).await;

        let end_time = self
            .resolve_end_time(doctor_id, request.appointment_date, request.start_time, request.end_time)
            .await?;

        if self
            .conflicts
            .has_conflict(doctor_id, request.appointment_date, request.start_time, None)
            .await?
        {
            return Err(AppointmentError::ConflictDetected);
        }

        let appointment = self
            .repository
            .insert(NewAppointment {
                patient_id,
                doctor_id,
                appointment_date: request.appointment_date,
                start_time: request.start_time,
                end_time,
                status: AppointmentStatus::Requested,
                reason: request.reason,
            })
            .await
            .map_err(conflict_on_unique)?;

        info!(
            "Appointment {} booked for patient {} with doctor {} on {} {}-{}",
            appointment.id, patient_id, doctor_id, appointment.appointment_date,
            appointment.start_time, appointment.end_time
        );
        Ok(appointment)
    }

    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<AvailableSlotsResponse, AppointmentError> {
        if !self.directory.doctor_exists(doctor_id).await? {
            return Err(AppointmentError::DoctorNotFound);
        }

        let slots = self.slots.generate_slots(doctor_id, date).await?;
        Ok(AvailableSlotsResponse {
            doctor_id,
            date,
            slots,
        })
    }

    // ==========================================================================
    // STATUS TRANSITIONS
    // ==========================================================================

    pub async fn accept(&self, actor: &Actor, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let doctor_id = self.load(appointment_id).await?.doctor_id;
        let _guard = self.locks.acquire(&doctor_id).await;
        let mut appointment = self.load(appointment_id).await?;

        require_own_doctor(actor, &appointment, "accept")?;
        let next = self.lifecycle.validate_transition(appointment.status, Transition::Accept)?;

        if self
            .conflicts
            .has_conflict(doctor_id, appointment.appointment_date, appointment.start_time, Some(appointment.id))
            .await?
        {
            return Err(AppointmentError::ConflictDetected);
        }

        appointment.status = next;
        let accepted = self.persist(appointment).await?;
        info!("Appointment {} accepted by doctor {}", accepted.id, actor.id);
        Ok(accepted)
    }

    pub async fn reject(&self, actor: &Actor, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let doctor_id = self.load(appointment_id).await?.doctor_id;
        let _guard = self.locks.acquire(&doctor_id).await;
        let mut appointment = self.load(appointment_id).await?;

        require_own_doctor(actor, &appointment, "reject")?;
        appointment.status = self.lifecycle.validate_transition(appointment.status, Transition::Reject)?;

        let rejected = self.persist(appointment).await?;
        info!("Appointment {} rejected by doctor {}", rejected.id, actor.id);
        Ok(rejected)
    }

    pub async fn cancel(&self, actor: &Actor, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let doctor_id = self.load(appointment_id).await?.doctor_id;
        let _guard = self.locks.acquire(&doctor_id).await;
        let mut appointment = self.load(appointment_id).await?;

        if appointment.patient_id != actor.id && !actor.is_staff() {
            warn!("Actor {} attempted to cancel appointment {}", actor.id, appointment.id);
            return Err(AppointmentError::Unauthorized(
                "Only the patient or clinic staff can cancel this appointment".to_string(),
            ));
        }
        appointment.status = self.lifecycle.validate_transition(appointment.status, Transition::Cancel)?;

        let cancelled = self.persist(appointment).await?;
        info!("Appointment {} cancelled by {}", cancelled.id, actor.id);
        Ok(cancelled)
    }

    pub async fn complete(&self, actor: &Actor, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let doctor_id = self.load(appointment_id).await?.doctor_id;
        let _guard = self.locks.acquire(&doctor_id).await;
        let mut appointment = self.load(appointment_id).await?;

        if !actor.is_role(Role::Admin) {
            require_own_doctor(actor, &appointment, "complete")?;
        }
        appointment.status = self.lifecycle.validate_transition(appointment.status, Transition::Complete)?;

        let completed = self.persist(appointment).await?;
        info!("Appointment {} completed", completed.id);
        Ok(completed)
    }

    /// Move an appointment to a new slot. The status goes back to REQUESTED.
    pub async fn reschedule(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let doctor_id = self.load(appointment_id).await?.doctor_id;
        let _guard = self.locks.acquire(&doctor_id).await;
        let mut appointment = self.load(appointment_id).await?;

        let involved = appointment.patient_id == actor.id
            || (appointment.doctor_id == actor.id && actor.is_role(Role::Doctor));
        if !involved && !actor.is_staff() {
            warn!("Actor {} attempted to reschedule appointment {}", actor.id, appointment.id);
            return Err(AppointmentError::Unauthorized(
                "Not allowed to reschedule this appointment".to_string(),
            ));
        }

        let next = self
            .lifecycle
            .validate_transition(appointment.status, Transition::Reschedule)?;

        let end_time = self
            .resolve_end_time(doctor_id, request.appointment_date, request.start_time, request.end_time)
            .await?;

        if self
            .conflicts
            .has_conflict(doctor_id, request.appointment_date, request.start_time, Some(appointment.id))
            .await?
        {
            return Err(AppointmentError::ConflictDetected);
        }

        let previous = (appointment.appointment_date, appointment.start_time);
        appointment.appointment_date = request.appointment_date;
        appointment.start_time = request.start_time;
        appointment.end_time = end_time;
        appointment.status = next;

        let rescheduled = self.persist(appointment).await?;
        info!(
            "Appointment {} rescheduled from {} {} to {} {}",
            rescheduled.id, previous.0, previous.1, rescheduled.appointment_date, rescheduled.start_time
        );
        Ok(rescheduled)
    }

    /// Administrative override. Any status may be set, but entering a blocking
    /// status still has to win the slot.
    pub async fn update_status(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        if !actor.is_role(Role::Admin) {
            warn!("Actor {} attempted a status override on {}", actor.id, appointment_id);
            return Err(AppointmentError::Unauthorized(
                "Only administrators can override appointment status".to_string(),
            ));
        }

        let doctor_id = self.load(appointment_id).await?.doctor_id;
        let _guard = self.locks.acquire(&doctor_id).await;
        let mut appointment = self.load(appointment_id).await?;

        if status.is_blocking()
            && !appointment.status.is_blocking()
            && self
                .conflicts
                .has_conflict(doctor_id, appointment.appointment_date, appointment.start_time, Some(appointment.id))
                .await?
        {
            return Err(AppointmentError::ConflictDetected);
        }

        let previous = appointment.status;
        appointment.status = status;
        let updated = self.persist(appointment).await?;
        info!("Appointment {} status overridden {} -> {}", updated.id, previous, updated.status);
        Ok(updated)
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get(&self, actor: &Actor, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;

        if appointment.patient_id == actor.id || appointment.doctor_id == actor.id || actor.is_staff() {
            Ok(appointment)
        } else {
            Err(AppointmentError::Unauthorized(
                "Not allowed to view this appointment".to_string(),
            ))
        }
    }

    pub async fn my_appointments(&self, actor: &Actor) -> Result<Vec<Appointment>, AppointmentError> {
        if !actor.is_role(Role::Patient) {
            return Err(AppointmentError::Unauthorized(
                "Only patients have personal appointments".to_string(),
            ));
        }
        Ok(self.repository.list_for_patient(actor.id).await?)
    }

    pub async fn doctor_appointments(&self, actor: &Actor) -> Result<Vec<Appointment>, AppointmentError> {
        if !actor.is_role(Role::Doctor) {
            return Err(AppointmentError::Unauthorized(
                "Only doctors have a doctor schedule".to_string(),
            ));
        }
        Ok(self.repository.list_for_doctor(actor.id).await?)
    }

    pub async fn search(
        &self,
        actor: &Actor,
        query: AppointmentSearchQuery,
    ) -> Result<PagedResponse<Appointment>, AppointmentError> {
        if !actor.is_staff() {
            return Err(AppointmentError::Unauthorized(
                "Only clinic staff can search appointments".to_string(),
            ));
        }

        let (filters, page) = query.split();
        let found = self.repository.search(&filters, page).await?;
        Ok(PagedResponse::new(found.rows, page, found.total))
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.repository
            .find_by_id(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    async fn persist(&self, mut appointment: Appointment) -> Result<Appointment, AppointmentError> {
        appointment.updated_at = Utc::now();
        self.repository
            .update(&appointment)
            .await
            .map_err(conflict_on_unique)
    }

    /// End time of the slot starting at `start_time`; a caller-supplied end must match it.
    async fn resolve_end_time(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        requested_end: Option<NaiveTime>,
    ) -> Result<NaiveTime, AppointmentError> {
        if !is_whole_second(start_time) {
            return Err(AppointmentError::SlotNotAvailable(
                "Start time must fall on a slot boundary".to_string(),
            ));
        }

        let minutes = self.slots.resolve_slot_duration(doctor_id, date, start_time).await?;
        let (end_time, _) = start_time.overflowing_add_signed(Duration::minutes(minutes as i64));

        match requested_end {
            Some(end) if end != end_time => Err(AppointmentError::EndTimeMismatch { expected: end_time }),
            _ => Ok(end_time),
        }
    }
}

fn resolve_patient(actor: &Actor, requested: Option<Uuid>) -> Result<Uuid, AppointmentError> {
    match requested {
        Some(patient_id) if patient_id == actor.id => Ok(patient_id),
        Some(patient_id) if actor.is_staff() => Ok(patient_id),
        Some(patient_id) => {
            warn!("Actor {} attempted to book for patient {}", actor.id, patient_id);
            Err(AppointmentError::Unauthorized(
                "Only clinic staff can book for another patient".to_string(),
            ))
        }
        None if actor.is_role(Role::Patient) => Ok(actor.id),
        None => Err(AppointmentError::ValidationError("Patient id is required".to_string())),
    }
}

fn require_own_doctor(actor: &Actor, appointment: &Appointment, action: &str) -> Result<(), AppointmentError> {
    if actor.is_role(Role::Doctor) && appointment.doctor_id == actor.id {
        return Ok(());
    }
    warn!("Actor {} attempted to {} appointment {}", actor.id, action, appointment.id);
    Err(AppointmentError::Unauthorized(format!(
        "Only the appointment's doctor can {} it",
        action
    )))
}

fn conflict_on_unique(error: DbError) -> AppointmentError {
    match error {
        DbError::UniqueViolation(_) => AppointmentError::ConflictDetected,
        other => AppointmentError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn patient_resolution() {
        let patient = Actor::patient(Uuid::new_v4());
        let staff = Actor::staff(Uuid::new_v4());
        let other = Uuid::new_v4();

        assert_eq!(resolve_patient(&patient, None).unwrap(), patient.id);
        assert_eq!(resolve_patient(&patient, Some(patient.id)).unwrap(), patient.id);
        assert_matches!(resolve_patient(&patient, Some(other)), Err(AppointmentError::Unauthorized(_)));
        assert_eq!(resolve_patient(&staff, Some(other)).unwrap(), other);
        assert_matches!(resolve_patient(&staff, None), Err(AppointmentError::ValidationError(_)));
    }

    #[test]
    fn unique_violation_becomes_conflict() {
        assert_matches!(
            conflict_on_unique(DbError::UniqueViolation("x".into())),
            AppointmentError::ConflictDetected
        );
        assert_matches!(
            conflict_on_unique(DbError::NotFound("x".into())),
            AppointmentError::Database(DbError::NotFound(_))
        );
    }
}
