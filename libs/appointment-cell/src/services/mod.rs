pub mod booking;
pub mod cascade;
pub mod conflict;
pub mod lifecycle;
pub mod repository;

pub use booking::AppointmentBookingService;
pub use cascade::SchedulingCascadeService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::{AppointmentLifecycleService, Transition};
pub use repository::{
    AppointmentPage, AppointmentRepository, InMemoryAppointmentRepository,
    SupabaseAppointmentRepository,
};
