use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::supabase::SupabaseClient;

/// Lookup of doctor and patient accounts owned by the identity collaborator.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, DbError>;

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, DbError>;
}

pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn exists(&self, table: &str, id: Uuid) -> Result<bool, DbError> {
        let path = format!("/rest/v1/{}?id=eq.{}&select=id&limit=1", table, id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        debug!("Directory lookup {} {} -> {}", table, id, !rows.is_empty());
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl Directory for SupabaseDirectory {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, DbError> {
        self.exists("doctors", doctor_id).await
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, DbError> {
        self.exists("patients", patient_id).await
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    doctors: RwLock<HashSet<Uuid>>,
    patients: RwLock<HashSet<Uuid>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(doctors: impl IntoIterator<Item = Uuid>, patients: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            doctors: RwLock::new(doctors.into_iter().collect()),
            patients: RwLock::new(patients.into_iter().collect()),
        }
    }

    pub async fn add_doctor(&self, doctor_id: Uuid) {
        self.doctors.write().await.insert(doctor_id);
    }

    pub async fn add_patient(&self, patient_id: Uuid) {
        self.patients.write().await.insert(patient_id);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, DbError> {
        Ok(self.doctors.read().await.contains(&doctor_id))
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, DbError> {
        Ok(self.patients.read().await.contains(&patient_id))
    }
}
