use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveTime;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::{AvailabilityError, CreateAvailabilityRequest, DayOfWeek, NewAvailabilityWindow};
use doctor_cell::services::{AvailabilityRepository, AvailabilityService, SupabaseAvailabilityRepository};
use shared_database::{DbError, KeyedLocks, SupabaseClient, SupabaseDirectory};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn client(server: &MockServer) -> Arc<SupabaseClient> {
    Arc::new(SupabaseClient::new(&TestConfig::with_supabase_url(&server.uri())))
}

#[tokio::test]
async fn list_active_sorts_by_weekday() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("is_active", "eq.true"))
        .and(header("apikey", "test-anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_window_row(&doctor_id, "WEDNESDAY", "08:00:00", "09:00:00", 30),
            MockSupabaseResponses::availability_window_row(&doctor_id, "MONDAY", "10:00:00", "11:00:00", 30),
        ])))
        .mount(&server)
        .await;

    let repository = SupabaseAvailabilityRepository::new(client(&server));
    let windows = repository.list_active(Uuid::parse_str(&doctor_id).unwrap()).await.unwrap();

    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].day_of_week, DayOfWeek::Monday);
    assert_eq!(windows[1].day_of_week, DayOfWeek::Wednesday);
}

#[tokio::test]
async fn insert_posts_row_and_returns_representation() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_windows"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({
            "day_of_week": "FRIDAY",
            "start_time": "09:00:00",
            "slot_duration": 20
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::availability_window_row(&doctor_id.to_string(), "FRIDAY", "09:00:00", "10:00:00", 20),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let repository = SupabaseAvailabilityRepository::new(client(&server));
    let window = repository
        .insert(NewAvailabilityWindow {
            doctor_id,
            day_of_week: DayOfWeek::Friday,
            start_time: t(9, 0),
            end_time: t(10, 0),
            slot_duration: 20,
            is_active: true,
        })
        .await
        .unwrap();

    assert_eq!(window.doctor_id, doctor_id);
    assert_eq!(window.slot_starts(), vec![t(9, 0), t(9, 20), t(9, 40)]);
}

#[tokio::test]
async fn deactivate_counts_patched_rows() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    let mut first = MockSupabaseResponses::availability_window_row(&doctor_id.to_string(), "MONDAY", "09:00:00", "10:00:00", 30);
    first["is_active"] = json!(false);
    let mut second = MockSupabaseResponses::availability_window_row(&doctor_id.to_string(), "TUESDAY", "09:00:00", "10:00:00", 30);
    second["is_active"] = json!(false);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_windows"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(body_partial_json(json!({ "is_active": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([first, second])))
        .mount(&server)
        .await;

    let repository = SupabaseAvailabilityRepository::new(client(&server));
    assert_eq!(repository.deactivate_all(doctor_id).await.unwrap(), 2);
}

#[tokio::test]
async fn server_error_surfaces_as_database_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let repository = SupabaseAvailabilityRepository::new(client(&server));
    let result = repository.list_active(Uuid::new_v4()).await;
    assert_matches!(result, Err(DbError::Api { status: 500, .. }));
}

#[tokio::test]
async fn service_reports_unknown_doctor_from_directory() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let supabase = client(&server);
    let service = AvailabilityService::new(
        Arc::new(SupabaseAvailabilityRepository::new(supabase.clone())),
        Arc::new(SupabaseDirectory::new(supabase)),
        Arc::new(KeyedLocks::new()),
        30,
    );

    let admin = shared_models::auth::Actor::admin(Uuid::new_v4());
    let result = service
        .create_window(
            &admin,
            CreateAvailabilityRequest {
                doctor_id: Some(Uuid::new_v4()),
                day_of_week: DayOfWeek::Monday,
                start_time: t(9, 0),
                end_time: t(10, 0),
                slot_duration: None,
                is_active: None,
            },
        )
        .await;

    assert_matches!(result, Err(AvailabilityError::DoctorNotFound));
}
