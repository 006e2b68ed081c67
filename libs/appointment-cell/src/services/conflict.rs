use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::services::ReservationLookup;
use shared_database::DbError;

use crate::services::repository::AppointmentRepository;

pub struct ConflictDetectionService {
    repository: Arc<dyn AppointmentRepository>,
}

impl ConflictDetectionService {
    pub fn new(repository: Arc<dyn AppointmentRepository>) -> Self {
        Self { repository }
    }

    /// Whether another appointment holds a blocking status at this exact slot.
    ///
    /// `exclude` lets accept and reschedule ignore the appointment's own row.
    pub async fn has_conflict(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<bool, DbError> {
        let holders = self
            .repository
            .find_blocking(doctor_id, date, Some(start_time), exclude)
            .await?;

        if !holders.is_empty() {
            warn!(
                "Conflict for doctor {} on {} at {} (held by {})",
                doctor_id, date, start_time, holders[0].id
            );
        }

        Ok(!holders.is_empty())
    }
}

#[async_trait]
impl ReservationLookup for ConflictDetectionService {
    async fn reserved_start_times(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<BTreeSet<NaiveTime>, DbError> {
        let reserved: BTreeSet<NaiveTime> = self
            .repository
            .find_blocking(doctor_id, date, None, None)
            .await?
            .into_iter()
            .map(|appointment| appointment.start_time)
            .collect();

        debug!("Doctor {} has {} reserved slots on {}", doctor_id, reserved.len(), date);
        Ok(reserved)
    }
}
