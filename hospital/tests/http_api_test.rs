//! HTTP surface over the in-memory store with static bearer tokens.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode, header::AUTHORIZATION};
use axum_test::TestServer;
use common::{Hospital, ist};
use hospital::auth::{Identity, StaticIdentityProvider};
use hospital::booking::BookingCoordinator;
use hospital::occupancy::OccupancyEngine;
use hospital::scheduling::SlotScheduler;
use hospital::server::{AppState, build_router};
use serde_json::{Value, json};
use std::sync::Arc;

const ADMIN: &str = "admin-token";
const DESK: &str = "desk-token";
const DOCTOR: &str = "doctor-token";
const NURSE: &str = "nurse-token";
const ASHA: &str = "asha-token";
const KIRAN: &str = "kiran-token";

struct Api {
    server: TestServer,
    h: Hospital,
}

async fn api() -> Api {
    let h = Hospital::new().await;
    let tokens = StaticIdentityProvider::parse(&format!(
        "{ADMIN}=admin,{DESK}=frontdesk,{DOCTOR}=hcp:{},{NURSE}=hcp:{},{ASHA}=patient:{},{KIRAN}=patient:{}",
        h.doctor.id, h.nurse.id, h.patient.id, h.other_patient.id
    ))
    .unwrap();

    let clock = Arc::new(h.clock.clone());
    let state = AppState::new(
        h.store.clone(),
        OccupancyEngine::new(h.store.clone(), clock.clone()),
        SlotScheduler::new(h.store.clone(), clock.clone(), ist()),
        BookingCoordinator::new(h.store.clone(), clock, h.dispatcher.clone()),
        Identity(Arc::new(tokens)),
    );

    Api {
        server: TestServer::new(build_router(state)).unwrap(),
        h,
    }
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap())
}

impl Api {
    async fn add_room(&self, body: Value) -> Value {
        let (name, value) = bearer(ADMIN);
        let response = self.server.post("/room/add").add_header(name, value).json(&body).await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()
    }

    async fn add_slot(&self, day: &str, start: &str, end: &str) -> axum_test::TestResponse {
        let (name, value) = bearer(DOCTOR);
        self.server
            .post("/appointment/slots")
            .add_header(name, value)
            .json(&json!({
                "hcp_id": self.h.doctor.id,
                "slot_date": day,
                "start_time": start,
                "end_time": end,
            }))
            .await
    }
}

#[tokio::test]
async fn health_is_public() {
    let api = api().await;
    let response = api.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");

    api.server.get("/ready").await.assert_status_ok();
}

#[tokio::test]
async fn protected_routes_need_a_known_token() {
    let api = api().await;

    api.server
        .get("/room")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = bearer("nobody");
    let response = api.server.get("/room").add_header(name, value).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn roles_are_enforced() {
    let api = api().await;

    let (name, value) = bearer(ASHA);
    api.server
        .post("/room/add")
        .add_header(name, value)
        .json(&json!({"room_number": "N-1", "type": "Normal", "charges_per_day": 1500}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Nurses hold the slot capability but not a doctor's schedule
    let (name, value) = bearer(NURSE);
    api.server
        .post("/appointment/slots")
        .add_header(name, value)
        .json(&json!({
            "hcp_id": api.h.doctor.id,
            "slot_date": "2025-03-14",
            "start_time": "09:00",
            "end_time": "09:30",
        }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Patients only see their own appointments
    let (name, value) = bearer(ASHA);
    api.server
        .get(&format!("/appointment/appointments/patient/{}", api.h.other_patient.id))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admission_lifecycle() {
    let api = api().await;
    let room = api
        .add_room(json!({"room_number": "G-1", "type": "General", "charges_per_day": 900, "capacity": 2}))
        .await;
    let room_id = room["room"]["room_id"].clone();
    assert_eq!(room["room"]["status"], "Available");

    let (name, value) = bearer(DESK);
    let admitted = api
        .server
        .post("/admission/admit")
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "patient_name": "asha",
            "room_id": room_id,
            "total_fees": 1000,
            "remaining_fees": 1000,
        }))
        .await;
    admitted.assert_status(StatusCode::CREATED);
    let admission_id = admitted.json::<Value>()["admission"]["admission_id"].clone();

    let fees = api
        .server
        .put(&format!("/admission/fees/{admission_id}"))
        .add_header(name.clone(), value.clone())
        .json(&json!({"extra_amount": 200, "paid_amount": 500, "method": "card"}))
        .await;
    fees.assert_status_ok();
    let fees = fees.json::<Value>();
    assert_eq!(fees["total_fees"], 1200);
    assert_eq!(fees["remaining_fees"], 700);

    let listed = api
        .server
        .get("/admission/admitted-patients")
        .add_header(name.clone(), value.clone())
        .await
        .json::<Value>();
    assert_eq!(listed["admitted_patients"].as_array().unwrap().len(), 1);

    let discharged = api
        .server
        .put(&format!("/admission/discharge/{admission_id}"))
        .add_header(name.clone(), value.clone())
        .await;
    discharged.assert_status_ok();
    let billing = discharged.json::<Value>()["billing"].clone();
    assert_eq!(billing, json!({"total_fees": 1200, "fee_paid": 500, "remaining_fees": 700}));

    api.server
        .put(&format!("/admission/discharge/{admission_id}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_room_is_not_found() {
    let api = api().await;
    let (name, value) = bearer(DESK);
    api.server
        .post("/admission/admit")
        .add_header(name, value)
        .json(&json!({"patient_name": "asha", "room_id": 404, "total_fees": 0, "remaining_fees": 0}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overlapping_slot_reports_the_conflict() {
    let api = api().await;

    let first = api.add_slot("2025-03-14", "09:00", "10:00").await;
    first.assert_status(StatusCode::CREATED);
    let first_id = first.json::<Value>()["slot"]["slot_id"].clone();

    let clash = api.add_slot("2025-03-14", "09:30", "10:30").await;
    clash.assert_status(StatusCode::CONFLICT);
    let body = clash.json::<Value>();
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(body["conflict"][0]["slot_id"], first_id);

    api.add_slot("2025-03-14", "11:00", "10:00")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn booking_through_the_api() {
    let api = api().await;
    let slot = api.add_slot("2025-03-14", "09:00", "09:30").await.json::<Value>();
    let slot_id = slot["slot"]["slot_id"].clone();
    let listing = format!("/appointment/slots/{}/2025-03-14", api.h.doctor.id);

    // Slot listing needs no token
    let open = api.server.get(&listing).await.json::<Value>();
    assert_eq!(open.as_array().unwrap().len(), 1);
    assert_eq!(open[0]["slot_date"], "2025-03-14T05:30:00+05:30");

    let (name, value) = bearer(ASHA);
    api.server
        .post("/appointment/book")
        .add_header(name.clone(), value.clone())
        .json(&json!({"slot_id": slot_id, "date": "2025-03-21", "patient_id": api.h.patient.id}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let booked = api
        .server
        .post("/appointment/book")
        .add_header(name.clone(), value.clone())
        .json(&json!({"slot_id": slot_id, "date": "2025-03-14", "patient_id": api.h.patient.id}))
        .await;
    booked.assert_status(StatusCode::CREATED);
    let appointment_id = booked.json::<Value>()["appointment_id"].clone();

    assert!(api.server.get(&listing).await.json::<Value>().as_array().unwrap().is_empty());

    let (kiran, kiran_value) = bearer(KIRAN);
    api.server
        .post("/appointment/book")
        .add_header(kiran, kiran_value)
        .json(&json!({"slot_id": slot_id, "date": "2025-03-14", "patient_id": api.h.other_patient.id}))
        .await
        .assert_status(StatusCode::CONFLICT);

    let mine = api
        .server
        .get(&format!("/appointment/appointments/patient/{}", api.h.patient.id))
        .add_header(name, value)
        .await
        .json::<Value>();
    assert_eq!(mine["appointments"][0]["appointment_id"], appointment_id);

    let (doctor, doctor_value) = bearer(DOCTOR);
    let updated = api
        .server
        .patch(&format!("/appointment/appointments/{appointment_id}/status"))
        .add_header(doctor, doctor_value)
        .json(&json!({"status": "Cancelled"}))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["appointment"]["status"], "Cancelled");

    assert_eq!(api.server.get(&listing).await.json::<Value>().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn emergency_booking_through_the_api() {
    let mut api = api().await;
    let (name, value) = bearer(DESK);

    let booked = api
        .server
        .post("/appointment/book")
        .add_header(name, value)
        .json(&json!({
            "patient_id": api.h.patient.id,
            "doctor_id": api.h.doctor.id,
            "priority": "EMERGENCY",
            "notes": "collapsed in lobby",
        }))
        .await;
    booked.assert_status(StatusCode::CREATED);

    assert!(matches!(
        api.h.next_notification().await,
        hospital::notifications::Notification::EmergencyAppointment { .. }
    ));
}
