use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use shared_database::DbError;

use crate::models::{AvailabilityError, DayOfWeek};
use crate::services::repository::AvailabilityRepository;

/// Start times already held by blocking appointments for a doctor on a date.
///
/// Implemented by the appointment side so slot generation can stay here
/// without this cell knowing how appointments are stored.
#[async_trait]
pub trait ReservationLookup: Send + Sync {
    async fn reserved_start_times(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<BTreeSet<NaiveTime>, DbError>;
}

/// Lookup that never reports a reservation. Used where only the template matters.
pub struct NoReservations;

#[async_trait]
impl ReservationLookup for NoReservations {
    async fn reserved_start_times(
        &self,
        _doctor_id: Uuid,
        _date: NaiveDate,
    ) -> Result<BTreeSet<NaiveTime>, DbError> {
        Ok(BTreeSet::new())
    }
}

pub struct SlotGenerator {
    repository: Arc<dyn AvailabilityRepository>,
    reservations: Arc<dyn ReservationLookup>,
}

impl SlotGenerator {
    pub fn new(
        repository: Arc<dyn AvailabilityRepository>,
        reservations: Arc<dyn ReservationLookup>,
    ) -> Self {
        Self {
            repository,
            reservations,
        }
    }

    /// Free slot start times for a doctor on a date, ascending and without duplicates.
    pub async fn generate_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, AvailabilityError> {
        let day = DayOfWeek::of(date);
        let windows = self.repository.list_active_for_day(doctor_id, day).await?;
        if windows.is_empty() {
            debug!("Doctor {} has no active windows on {}", doctor_id, day);
            return Ok(Vec::new());
        }

        let reserved = self.reservations.reserved_start_times(doctor_id, date).await?;

        let free: BTreeSet<NaiveTime> = windows
            .iter()
            .flat_map(|window| window.slot_starts())
            .filter(|start| !reserved.contains(start))
            .collect();

        debug!(
            "Doctor {} on {}: {} free slots across {} windows ({} reserved)",
            doctor_id,
            date,
            free.len(),
            windows.len(),
            reserved.len()
        );

        Ok(free.into_iter().collect())
    }

    /// Slot length in minutes of the first active window that holds `time` on a slot boundary.
    pub async fn resolve_slot_duration(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<i32, AvailabilityError> {
        let windows = self
            .repository
            .list_active_for_day(doctor_id, DayOfWeek::of(date))
            .await?;

        windows
            .iter()
            .find(|window| window.fits(time))
            .map(|window| window.slot_duration)
            .ok_or_else(|| {
                AvailabilityError::NotAvailable(
                    "Requested time is not within doctor's availability".to_string(),
                )
            })
    }
}
