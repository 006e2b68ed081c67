use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use doctor_cell::services::AvailabilityService;
use shared_models::auth::Actor;

use crate::models::{AppointmentError, AppointmentOwner, DoctorRemovalReport};
use crate::services::repository::AppointmentRepository;

/// Scheduling side of removing a doctor or patient account.
///
/// Account deletion itself belongs to the identity collaborator; this only
/// retires availability and refuses removal while appointments still hold slots.
pub struct SchedulingCascadeService {
    availability: Arc<AvailabilityService>,
    repository: Arc<dyn AppointmentRepository>,
}

impl SchedulingCascadeService {
    pub fn new(availability: Arc<AvailabilityService>, repository: Arc<dyn AppointmentRepository>) -> Self {
        Self {
            availability,
            repository,
        }
    }

    pub async fn prepare_doctor_removal(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
    ) -> Result<DoctorRemovalReport, AppointmentError> {
        let windows_deactivated = self.availability.deactivate_all(actor, doctor_id).await?;
        let blocking_appointments = self
            .repository
            .count_blocking(AppointmentOwner::Doctor(doctor_id))
            .await?;

        info!(
            "Prepared removal of doctor {}: {} windows deactivated, {} blocking appointments remain",
            doctor_id, windows_deactivated, blocking_appointments
        );

        Ok(DoctorRemovalReport {
            doctor_id,
            windows_deactivated,
            blocking_appointments,
        })
    }

    pub async fn ensure_removable(&self, owner: AppointmentOwner) -> Result<(), AppointmentError> {
        let remaining = self.repository.count_blocking(owner).await?;
        if remaining > 0 {
            warn!("Refusing removal of {}: {} blocking appointments", owner, remaining);
            return Err(AppointmentError::ValidationError(format!(
                "Cannot remove {} with {} active appointments",
                owner, remaining
            )));
        }
        Ok(())
    }
}
