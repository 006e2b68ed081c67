pub mod availability;
pub mod repository;
pub mod slots;

pub use availability::AvailabilityService;
pub use repository::{AvailabilityRepository, InMemoryAvailabilityRepository, SupabaseAvailabilityRepository};
pub use slots::{NoReservations, ReservationLookup, SlotGenerator};
