use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{AvailabilityService, SlotGenerator};

/// Everything the doctor routes need, built once at startup.
pub struct DoctorCellState {
    pub config: Arc<AppConfig>,
    pub availability: Arc<AvailabilityService>,
    pub slots: Arc<SlotGenerator>,
}

pub fn doctor_routes(state: Arc<DoctorCellState>) -> Router {
    let public_routes = Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_doctor_availability))
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots));

    let protected_routes = Router::new()
        .route("/availability", post(handlers::create_availability))
        .route("/{doctor_id}/availability", delete(handlers::deactivate_doctor_availability))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
