use std::env;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_SLOT_MINUTES: i32 = 30;

/// Where the scheduling tables live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgREST tables behind Supabase.
    Supabase,
    /// Process-local tables, for development and tests.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StorageBackend::Supabase),
            "memory" | "in_memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: Option<String>,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub default_slot_minutes: i32,
    pub server_port: u16,
    /// Doctor accounts known to the in-memory directory.
    pub memory_doctor_ids: Vec<Uuid>,
    /// Patient accounts known to the in-memory directory.
    pub memory_patient_ids: Vec<Uuid>,
}

fn uuid_list(name: &str) -> Vec<Uuid> {
    let Ok(raw) = env::var(name) else {
        return Vec::new();
    };

    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .filter_map(|value| match Uuid::parse_str(value) {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("Ignoring invalid id {:?} in {}", value, name);
                None
            }
        })
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .ok()
            .filter(|key| !key.is_empty());
        let supabase_jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_JWT_SECRET not set, using empty value");
                String::new()
            });

        let supabase_ready = !supabase_url.is_empty() && !supabase_anon_key.is_empty();
        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to in-memory storage", e);
                StorageBackend::Memory
            }),
            Err(_) if supabase_ready => StorageBackend::Supabase,
            Err(_) => {
                warn!("STORAGE_BACKEND not set and Supabase not configured, using in-memory storage");
                StorageBackend::Memory
            }
        };

        let default_slot_minutes = env::var("DEFAULT_SLOT_MINUTES")
            .ok()
            .and_then(|value| value.parse::<i32>().ok())
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_SLOT_MINUTES);

        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or_else(|| {
                warn!("SERVER_PORT not set or invalid, using default");
                3000
            });

        let config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            supabase_jwt_secret,
            storage_backend,
            default_slot_minutes,
            server_port,
            memory_doctor_ids: uuid_list("MEMORY_DOCTOR_IDS"),
            memory_patient_ids: uuid_list("MEMORY_PATIENT_IDS"),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Key sent as `apikey`/bearer when the scheduler talks to PostgREST on its own behalf.
    pub fn database_key(&self) -> &str {
        self.supabase_service_role_key
            .as_deref()
            .unwrap_or(&self.supabase_anon_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_storage_backend_names() {
        assert_eq!("supabase".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert_eq!(" Memory ".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn database_key_prefers_service_role() {
        let mut config = AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_service_role_key: None,
            supabase_jwt_secret: "secret".to_string(),
            storage_backend: StorageBackend::Supabase,
            default_slot_minutes: DEFAULT_SLOT_MINUTES,
            server_port: 3000,
            memory_doctor_ids: Vec::new(),
            memory_patient_ids: Vec::new(),
        };
        assert_eq!(config.database_key(), "anon");

        config.supabase_service_role_key = Some("service".to_string());
        assert_eq!(config.database_key(), "service");
    }
}
