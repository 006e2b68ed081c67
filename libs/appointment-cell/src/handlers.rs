use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use doctor_cell::models::AvailableSlotsResponse;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::actor_from_user;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatusUpdateRequest, BookAppointmentRequest,
    DoctorRemovalReport, PagedResponse, RescheduleAppointmentRequest, SlotsQuery,
};
use crate::router::AppointmentCellState;

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.booking.book(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppointmentCellState>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    let slots = state.booking.available_slots(query.doctor_id, query.date).await?;
    Ok(Json(slots))
}

// ==============================================================================
// STATUS TRANSITION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn accept_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.booking.accept(&actor, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.booking.reject(&actor, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.booking.cancel(&actor, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.booking.complete(&actor, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.booking.reschedule(&actor, appointment_id, request).await?))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<AppointmentStatusUpdateRequest>,
) -> Result<Json<Appointment>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.booking.update_status(&actor, appointment_id, request.status).await?))
}

// ==============================================================================
// QUERY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Appointment>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.booking.get(&actor, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.booking.my_appointments(&actor).await?))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.booking.doctor_appointments(&actor).await?))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<PagedResponse<Appointment>>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.booking.search(&actor, query).await?))
}

// ==============================================================================
// ACCOUNT REMOVAL
// ==============================================================================

#[axum::debug_handler]
pub async fn prepare_doctor_removal(
    State(state): State<Arc<AppointmentCellState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<DoctorRemovalReport>, AppError> {
    let actor = actor_from_user(&user)?;
    Ok(Json(state.cascade.prepare_doctor_removal(&actor, doctor_id).await?))
}
