use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use appointment_cell::router::AppointmentCellState;
use appointment_cell::services::{
    AppointmentBookingService, AppointmentRepository, ConflictDetectionService,
    InMemoryAppointmentRepository, SchedulingCascadeService, SupabaseAppointmentRepository,
};
use doctor_cell::router::DoctorCellState;
use doctor_cell::services::{
    AvailabilityRepository, AvailabilityService, InMemoryAvailabilityRepository, SlotGenerator,
    SupabaseAvailabilityRepository,
};
use shared_config::{AppConfig, StorageBackend};
use shared_database::{Directory, InMemoryDirectory, KeyedLocks, SupabaseClient, SupabaseDirectory};

/// Cell states sharing one set of storage adapters and one per-doctor lock table.
pub struct AppState {
    pub doctors: Arc<DoctorCellState>,
    pub appointments: Arc<AppointmentCellState>,
}

struct Storage {
    availability: Arc<dyn AvailabilityRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    directory: Arc<dyn Directory>,
}

fn storage(config: &AppConfig) -> Storage {
    match config.storage_backend {
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(config));
            Storage {
                availability: Arc::new(SupabaseAvailabilityRepository::new(supabase.clone())),
                appointments: Arc::new(SupabaseAppointmentRepository::new(supabase.clone())),
                directory: Arc::new(SupabaseDirectory::new(supabase)),
            }
        }
        StorageBackend::Memory => {
            info!(
                "Using in-memory storage ({} doctors, {} patients seeded)",
                config.memory_doctor_ids.len(),
                config.memory_patient_ids.len()
            );
            Storage {
                availability: Arc::new(InMemoryAvailabilityRepository::new()),
                appointments: Arc::new(InMemoryAppointmentRepository::new()),
                directory: Arc::new(InMemoryDirectory::seeded(
                    config.memory_doctor_ids.iter().copied(),
                    config.memory_patient_ids.iter().copied(),
                )),
            }
        }
    }
}

pub fn build(config: Arc<AppConfig>) -> AppState {
    let Storage {
        availability,
        appointments,
        directory,
    } = storage(&config);
    let locks = Arc::new(KeyedLocks::<Uuid>::new());

    let availability_service = Arc::new(AvailabilityService::new(
        availability.clone(),
        directory.clone(),
        locks.clone(),
        config.default_slot_minutes,
    ));
    let conflicts = Arc::new(ConflictDetectionService::new(appointments.clone()));
    let slots = Arc::new(SlotGenerator::new(availability, conflicts.clone()));

    let booking = Arc::new(AppointmentBookingService::new(
        appointments.clone(),
        conflicts,
        slots.clone(),
        directory,
        locks,
    ));
    let cascade = Arc::new(SchedulingCascadeService::new(availability_service.clone(), appointments));

    AppState {
        doctors: Arc::new(DoctorCellState {
            config: config.clone(),
            availability: availability_service,
            slots,
        }),
        appointments: Arc::new(AppointmentCellState {
            config,
            booking,
            cascade,
        }),
    }
}
