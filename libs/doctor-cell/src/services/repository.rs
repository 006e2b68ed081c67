use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DbError, SupabaseClient};

use crate::models::{AvailabilityWindow, DayOfWeek, NewAvailabilityWindow};

const TABLE: &str = "/rest/v1/availability_windows";

/// Persistence for availability windows. Only the availability service writes through it.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn insert(&self, window: NewAvailabilityWindow) -> Result<AvailabilityWindow, DbError>;

    /// Active windows ordered by day of week, then start time.
    async fn list_active(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityWindow>, DbError>;

    /// Active windows for one day ordered by start time.
    async fn list_active_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: DayOfWeek,
    ) -> Result<Vec<AvailabilityWindow>, DbError>;

    /// Flip every active window of the doctor to inactive. Returns how many changed.
    async fn deactivate_all(&self, doctor_id: Uuid) -> Result<u64, DbError>;
}

fn sort_by_day_then_start(windows: &mut [AvailabilityWindow]) {
    windows.sort_by(|a, b| {
        a.day_of_week
            .cmp(&b.day_of_week)
            .then(a.start_time.cmp(&b.start_time))
    });
}

// ==============================================================================
// SUPABASE ADAPTER
// ==============================================================================

pub struct SupabaseAvailabilityRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAvailabilityRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl AvailabilityRepository for SupabaseAvailabilityRepository {
    async fn insert(&self, window: NewAvailabilityWindow) -> Result<AvailabilityWindow, DbError> {
        let body = json!({
            "doctor_id": window.doctor_id,
            "day_of_week": window.day_of_week,
            "start_time": window.start_time.format("%H:%M:%S").to_string(),
            "end_time": window.end_time.format("%H:%M:%S").to_string(),
            "slot_duration": window.slot_duration,
            "is_active": window.is_active,
            "created_at": Utc::now().to_rfc3339(),
        });

        let mut rows: Vec<AvailabilityWindow> =
            self.supabase.write_returning(Method::POST, TABLE, body).await?;

        rows.pop()
            .ok_or_else(|| DbError::NotFound("Insert returned no availability window".to_string()))
    }

    async fn list_active(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityWindow>, DbError> {
        // day_of_week is stored as text, so the weekly order is applied here
        let path = format!(
            "{}?doctor_id=eq.{}&is_active=eq.true&order=start_time.asc",
            TABLE, doctor_id
        );
        let mut windows: Vec<AvailabilityWindow> =
            self.supabase.request(Method::GET, &path, None).await?;
        sort_by_day_then_start(&mut windows);
        Ok(windows)
    }

    async fn list_active_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: DayOfWeek,
    ) -> Result<Vec<AvailabilityWindow>, DbError> {
        let path = format!(
            "{}?doctor_id=eq.{}&day_of_week=eq.{}&is_active=eq.true&order=start_time.asc",
            TABLE, doctor_id, day_of_week
        );
        let mut windows: Vec<AvailabilityWindow> =
            self.supabase.request(Method::GET, &path, None).await?;
        windows.sort_by_key(|w| w.start_time);
        Ok(windows)
    }

    async fn deactivate_all(&self, doctor_id: Uuid) -> Result<u64, DbError> {
        let path = format!("{}?doctor_id=eq.{}&is_active=eq.true", TABLE, doctor_id);
        let rows: Vec<AvailabilityWindow> = self
            .supabase
            .write_returning(Method::PATCH, &path, json!({ "is_active": false }))
            .await?;
        debug!("Deactivated {} windows for doctor {}", rows.len(), doctor_id);
        Ok(rows.len() as u64)
    }
}

// ==============================================================================
// IN-MEMORY ADAPTER
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAvailabilityRepository {
    windows: RwLock<Vec<AvailabilityWindow>>,
}

impl InMemoryAvailabilityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored windows, active or not.
    pub async fn all(&self) -> Vec<AvailabilityWindow> {
        self.windows.read().await.clone()
    }
}

#[async_trait]
impl AvailabilityRepository for InMemoryAvailabilityRepository {
    async fn insert(&self, window: NewAvailabilityWindow) -> Result<AvailabilityWindow, DbError> {
        let stored = window.into_window(Uuid::new_v4(), Utc::now());
        self.windows.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_active(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityWindow>, DbError> {
        let mut windows: Vec<AvailabilityWindow> = self
            .windows
            .read()
            .await
            .iter()
            .filter(|w| w.doctor_id == doctor_id && w.is_active)
            .cloned()
            .collect();
        sort_by_day_then_start(&mut windows);
        Ok(windows)
    }

    async fn list_active_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: DayOfWeek,
    ) -> Result<Vec<AvailabilityWindow>, DbError> {
        let mut windows: Vec<AvailabilityWindow> = self
            .windows
            .read()
            .await
            .iter()
            .filter(|w| w.doctor_id == doctor_id && w.is_active && w.day_of_week == day_of_week)
            .cloned()
            .collect();
        windows.sort_by_key(|w| w.start_time);
        Ok(windows)
    }

    async fn deactivate_all(&self, doctor_id: Uuid) -> Result<u64, DbError> {
        let mut windows = self.windows.write().await;
        let mut changed = 0;
        for window in windows.iter_mut().filter(|w| w.doctor_id == doctor_id && w.is_active) {
            window.is_active = false;
            changed += 1;
        }
        Ok(changed)
    }
}
