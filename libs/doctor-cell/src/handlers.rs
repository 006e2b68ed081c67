use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::actor_from_user;

use crate::models::{
    AvailabilityQuery, AvailableSlotsQuery, AvailableSlotsResponse, CreateAvailabilityRequest,
    DeactivationResponse,
};
use crate::router::DoctorCellState;

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let windows = match query.day_of_week {
        Some(day) => state.availability.list_active_windows_for_day(doctor_id, day).await?,
        None => state.availability.list_active_windows(doctor_id).await?,
    };
    Ok(Json(json!(windows)))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    state.availability.ensure_doctor_exists(doctor_id).await?;
    let slots = state.slots.generate_slots(doctor_id, query.date).await?;

    Ok(Json(AvailableSlotsResponse {
        doctor_id,
        date: query.date,
        slots,
    }))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<DoctorCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = actor_from_user(&user)?;
    let window = state.availability.create_window(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(json!(window))))
}

#[axum::debug_handler]
pub async fn deactivate_doctor_availability(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<DeactivationResponse>, AppError> {
    let actor = actor_from_user(&user)?;
    let windows_deactivated = state.availability.deactivate_all(&actor, doctor_id).await?;

    Ok(Json(DeactivationResponse {
        doctor_id,
        windows_deactivated,
    }))
}
