use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Named transitions of the appointment state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Accept,
    Reject,
    Cancel,
    Complete,
    Reschedule,
}

impl Transition {
    /// Past participle used in error messages ("cannot be accepted").
    pub fn verb(&self) -> &'static str {
        match self {
            Transition::Accept => "accepted",
            Transition::Reject => "rejected",
            Transition::Cancel => "cancelled",
            Transition::Complete => "completed",
            Transition::Reschedule => "rescheduled",
        }
    }

    pub fn target(&self) -> AppointmentStatus {
        match self {
            Transition::Accept => AppointmentStatus::Accepted,
            Transition::Reject => AppointmentStatus::Rejected,
            Transition::Cancel => AppointmentStatus::Cancelled,
            Transition::Complete => AppointmentStatus::Completed,
            Transition::Reschedule => AppointmentStatus::Requested,
        }
    }
}

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Whether `transition` may start from `current`.
    pub fn permits(&self, current: AppointmentStatus, transition: Transition) -> bool {
        match transition {
            Transition::Accept | Transition::Reject => current == AppointmentStatus::Requested,
            Transition::Cancel => !current.is_terminal(),
            Transition::Complete => current == AppointmentStatus::Accepted,
            // A completed visit is history; anything else can be moved to a new slot.
            Transition::Reschedule => current != AppointmentStatus::Completed,
        }
    }

    pub fn validate_transition(
        &self,
        current: AppointmentStatus,
        transition: Transition,
    ) -> Result<AppointmentStatus, AppointmentError> {
        debug!("Validating {:?} from {}", transition, current);

        if !self.permits(current, transition) {
            warn!("Invalid transition attempted: {:?} from {}", transition, current);
            return Err(AppointmentError::InvalidStatusTransition {
                status: current,
                action: transition.verb(),
            });
        }

        Ok(transition.target())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
