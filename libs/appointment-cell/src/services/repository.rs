use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DbError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentFilters, AppointmentOwner, NewAppointment, PageRequest,
    BLOCKING_STATUSES,
};

const TABLE: &str = "/rest/v1/appointments";

/// One page of appointments plus the number of rows matching the filters.
#[derive(Debug, Clone)]
pub struct AppointmentPage {
    pub rows: Vec<Appointment>,
    pub total: u64,
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, DbError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DbError>;

    /// Persist date, times, status and reason of an existing appointment.
    async fn update(&self, appointment: &Appointment) -> Result<Appointment, DbError>;

    /// Blocking appointments of a doctor on a date, optionally at one start time
    /// and optionally ignoring one appointment.
    async fn find_blocking(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: Option<NaiveTime>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, DbError>;

    /// Newest first.
    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DbError>;

    /// Newest first.
    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, DbError>;

    async fn search(
        &self,
        filters: &AppointmentFilters,
        page: PageRequest,
    ) -> Result<AppointmentPage, DbError>;

    async fn count_blocking(&self, owner: AppointmentOwner) -> Result<u64, DbError>;
}

fn newest_first(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| {
        b.appointment_date
            .cmp(&a.appointment_date)
            .then(b.start_time.cmp(&a.start_time))
    });
}

fn time_param(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

fn blocking_in_list() -> String {
    let statuses: Vec<String> = BLOCKING_STATUSES.iter().map(|s| s.to_string()).collect();
    urlencoding::encode(&format!("in.({})", statuses.join(","))).into_owned()
}

// ==============================================================================
// SUPABASE ADAPTER
// ==============================================================================

pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn filter_query(filters: &AppointmentFilters) -> Vec<String> {
        let mut query_parts = Vec::new();
        if let Some(status) = filters.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(doctor_id) = filters.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = filters.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(date) = filters.date {
            query_parts.push(format!("appointment_date=eq.{}", date));
        }
        query_parts
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, DbError> {
        let now = Utc::now().to_rfc3339();
        let body = json!({
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "appointment_date": appointment.appointment_date,
            "start_time": time_param(appointment.start_time),
            "end_time": time_param(appointment.end_time),
            "status": appointment.status,
            "reason": appointment.reason,
            "created_at": now,
            "updated_at": now,
        });

        let mut rows: Vec<Appointment> =
            self.supabase.write_returning(Method::POST, TABLE, body).await?;
        rows.pop()
            .ok_or_else(|| DbError::NotFound("Insert returned no appointment".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DbError> {
        let path = format!("{}?id=eq.{}&limit=1", TABLE, id);
        let mut rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.pop())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, DbError> {
        let path = format!("{}?id=eq.{}", TABLE, appointment.id);
        let body = json!({
            "appointment_date": appointment.appointment_date,
            "start_time": time_param(appointment.start_time),
            "end_time": time_param(appointment.end_time),
            "status": appointment.status,
            "reason": appointment.reason,
            "updated_at": appointment.updated_at.to_rfc3339(),
        });

        let mut rows: Vec<Appointment> =
            self.supabase.write_returning(Method::PATCH, &path, body).await?;
        rows.pop()
            .ok_or_else(|| DbError::NotFound(format!("Appointment {} not found", appointment.id)))
    }

    async fn find_blocking(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: Option<NaiveTime>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, DbError> {
        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            format!("appointment_date=eq.{}", date),
            format!("status={}", blocking_in_list()),
        ];
        if let Some(start) = start_time {
            query_parts.push(format!("start_time=eq.{}", time_param(start)));
        }
        if let Some(id) = exclude {
            query_parts.push(format!("id=neq.{}", id));
        }

        let path = format!("{}?{}", TABLE, query_parts.join("&"));
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DbError> {
        let path = format!(
            "{}?patient_id=eq.{}&order=appointment_date.desc,start_time.desc",
            TABLE, patient_id
        );
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, DbError> {
        let path = format!(
            "{}?doctor_id=eq.{}&order=appointment_date.desc,start_time.desc",
            TABLE, doctor_id
        );
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn search(
        &self,
        filters: &AppointmentFilters,
        page: PageRequest,
    ) -> Result<AppointmentPage, DbError> {
        let mut query_parts = Self::filter_query(filters);
        query_parts.push("order=appointment_date.desc,start_time.desc".to_string());
        query_parts.push(format!("limit={}", page.size));
        query_parts.push(format!("offset={}", page.offset()));

        let path = format!("{}?{}", TABLE, query_parts.join("&"));
        debug!("Searching appointments: {}", path);

        let counted = self.supabase.get_counted::<Appointment>(&path).await?;
        Ok(AppointmentPage {
            rows: counted.rows,
            total: counted.total,
        })
    }

    async fn count_blocking(&self, owner: AppointmentOwner) -> Result<u64, DbError> {
        let owner_filter = match owner {
            AppointmentOwner::Doctor(id) => format!("doctor_id=eq.{}", id),
            AppointmentOwner::Patient(id) => format!("patient_id=eq.{}", id),
        };
        let path = format!(
            "{}?{}&status={}&select=id&limit=1",
            TABLE,
            owner_filter,
            blocking_in_list()
        );

        let counted = self.supabase.get_counted::<Value>(&path).await?;
        Ok(counted.total)
    }
}

// ==============================================================================
// IN-MEMORY ADAPTER
// ==============================================================================

/// Keeps the same partial uniqueness rule as the database: one blocking row
/// per (doctor, date, start time).
#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Appointment> {
        let mut all: Vec<Appointment> = self.appointments.read().await.values().cloned().collect();
        newest_first(&mut all);
        all
    }

    fn violates_unique_slot(store: &HashMap<Uuid, Appointment>, candidate: &Appointment) -> bool {
        candidate.status.is_blocking()
            && store.values().any(|existing| {
                existing.id != candidate.id
                    && existing.status.is_blocking()
                    && existing.doctor_id == candidate.doctor_id
                    && existing.appointment_date == candidate.appointment_date
                    && existing.start_time == candidate.start_time
            })
    }

    async fn select<F>(&self, predicate: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool + Send,
    {
        let mut rows: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| predicate(a))
            .cloned()
            .collect();
        newest_first(&mut rows);
        rows
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, DbError> {
        let stored = appointment.into_appointment(Uuid::new_v4(), Utc::now());
        let mut store = self.appointments.write().await;
        if Self::violates_unique_slot(&store, &stored) {
            return Err(DbError::UniqueViolation("appointments_blocking_slot_key".to_string()));
        }
        store.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DbError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, DbError> {
        let mut store = self.appointments.write().await;
        if !store.contains_key(&appointment.id) {
            return Err(DbError::NotFound(format!("Appointment {} not found", appointment.id)));
        }
        if Self::violates_unique_slot(&store, appointment) {
            return Err(DbError::UniqueViolation("appointments_blocking_slot_key".to_string()));
        }
        store.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn find_blocking(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: Option<NaiveTime>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, DbError> {
        Ok(self
            .select(|a| {
                a.doctor_id == doctor_id
                    && a.appointment_date == date
                    && a.status.is_blocking()
                    && start_time.map_or(true, |start| a.start_time == start)
                    && exclude.map_or(true, |id| a.id != id)
            })
            .await)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DbError> {
        Ok(self.select(|a| a.patient_id == patient_id).await)
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, DbError> {
        Ok(self.select(|a| a.doctor_id == doctor_id).await)
    }

    async fn search(
        &self,
        filters: &AppointmentFilters,
        page: PageRequest,
    ) -> Result<AppointmentPage, DbError> {
        let matching = self
            .select(|a| {
                filters.status.map_or(true, |s| a.status == s)
                    && filters.doctor_id.map_or(true, |id| a.doctor_id == id)
                    && filters.patient_id.map_or(true, |id| a.patient_id == id)
                    && filters.date.map_or(true, |d| a.appointment_date == d)
            })
            .await;

        let total = matching.len() as u64;
        let rows = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .collect();

        Ok(AppointmentPage { rows, total })
    }

    async fn count_blocking(&self, owner: AppointmentOwner) -> Result<u64, DbError> {
        let rows = self
            .select(|a| {
                a.status.is_blocking()
                    && match owner {
                        AppointmentOwner::Doctor(id) => a.doctor_id == id,
                        AppointmentOwner::Patient(id) => a.patient_id == id,
                    }
            })
            .await;
        Ok(rows.len() as u64)
    }
}
