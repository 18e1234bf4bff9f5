use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use chrono::NaiveDate;
use serde_json::{json, Value};

use turnero::{
    clock::FixedClock,
    db::{create_admin, Store},
    notify::LogNotifier,
    routes,
    state::AppState,
};

const ADMIN_AUTH: &str = "Basic b3duZXI6czNjcmV0LXBhc3M="; // owner:s3cret-pass
const WRONG_AUTH: &str = "Basic b3duZXI6d3Jvbmc="; // owner:wrong

/// Saturday 2024-06-01 10:00, two days before the Monday the tests book.
async fn test_state() -> AppState {
    let store = Store::in_memory().await.unwrap();
    create_admin(store.pool(), "owner", "Owner", "s3cret-pass")
        .await
        .unwrap();
    let now = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    AppState::new(store, Arc::new(FixedClock(now)), Arc::new(LogNotifier))
}

fn slots(body: &Value) -> Vec<&str> {
    body["slots"]
        .as_array()
        .map(|slots| slots.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

#[actix_web::test]
async fn admin_routes_require_credentials() {
    let state = test_state().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::public::configure)
            .configure(routes::admin::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/admin/api/professionals").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/admin/api/professionals")
        .insert_header(("Authorization", WRONG_AUTH))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/admin/api/me")
        .insert_header(("Authorization", ADMIN_AUTH))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["username"], "owner");

    let req = test::TestRequest::get().uri("/health").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn schedule_book_and_cancel() {
    let state = test_state().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::public::configure)
            .configure(routes::admin::configure),
    )
    .await;

    // A professional with a Monday template of 09:00 and 09:30.
    let req = test::TestRequest::post()
        .uri("/admin/api/professionals")
        .insert_header(("Authorization", ADMIN_AUTH))
        .set_json(json!({ "name": "Lucas", "specialty": "Barber" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let professional: Value = test::read_body_json(resp).await;
    let id = professional["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/admin/api/professionals/{id}/template/1"))
        .insert_header(("Authorization", ADMIN_AUTH))
        .set_json(json!({ "start": "09:00", "end": "10:00", "interval_minutes": 30 }))
        .to_request();
    let added: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(added["inserted"], 2);

    // 2024-06-03: 09:00 off, 14:00 added.
    let req = test::TestRequest::put()
        .uri(&format!("/admin/api/professionals/{id}/days/2024-06-03/slots/09:00"))
        .insert_header(("Authorization", ADMIN_AUTH))
        .set_json(json!({ "active": false }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri(&format!("/admin/api/professionals/{id}/days/2024-06-03/slots"))
        .insert_header(("Authorization", ADMIN_AUTH))
        .set_json(json!({ "time": "14:00" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let availability_uri = format!("/api/professionals/{id}/availability?date=2024-06-03");
    let req = test::TestRequest::get().uri(&availability_uri).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["state"], "open");
    assert_eq!(slots(&body), vec!["09:30:00", "14:00:00"]);
    assert_eq!(body["has_availability"], true);

    // Book 09:30, twice.
    let booking = json!({
        "professional_id": id,
        "date": "2024-06-03",
        "time": "09:30",
        "name": "Ana Paz",
        "phone": "3794123456",
        "email": "ana@example.com",
        "service": "Corte"
    });
    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(&booking)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["end_time"], "10:00:00");
    assert_eq!(created["status"], "confirmed");
    let booking_id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(&booking)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["error"], "slot_already_taken");

    let req = test::TestRequest::get().uri(&availability_uri).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(slots(&body), vec!["14:00:00"]);
    assert_eq!(body["has_availability"], true);

    // The booked time is protected and visible in the admin day view.
    let req = test::TestRequest::put()
        .uri(&format!("/admin/api/professionals/{id}/days/2024-06-03/slots/09:30"))
        .insert_header(("Authorization", ADMIN_AUTH))
        .set_json(json!({ "active": false }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["error"], "slot_protected");

    let req = test::TestRequest::get()
        .uri(&format!("/admin/api/professionals/{id}/days/2024-06-03"))
        .insert_header(("Authorization", ADMIN_AUTH))
        .to_request();
    let day: Value = test::call_and_read_body_json(&app, req).await;
    let booked: Vec<_> = day["slots"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|slot| slot["state"] == "booked")
        .map(|slot| slot["time"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(booked, vec!["09:30:00"]);

    // Moving the booking to 14:00 frees 09:30.
    let mut moved = booking.clone();
    moved["time"] = json!("14:00");
    let req = test::TestRequest::put()
        .uri(&format!("/admin/api/bookings/{booking_id}"))
        .insert_header(("Authorization", ADMIN_AUTH))
        .set_json(&moved)
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["start_time"], "14:00:00");
    assert_eq!(updated["end_time"], "14:30:00");

    let req = test::TestRequest::get().uri(&availability_uri).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(slots(&body), vec!["09:30:00"]);

    moved["time"] = json!("09:15");
    let req = test::TestRequest::put()
        .uri(&format!("/admin/api/bookings/{booking_id}"))
        .insert_header(("Authorization", ADMIN_AUTH))
        .set_json(&moved)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["error"], "slot_not_offered");

    // Cancelling frees the slot again.
    let req = test::TestRequest::put()
        .uri(&format!("/admin/api/bookings/{booking_id}/status"))
        .insert_header(("Authorization", ADMIN_AUTH))
        .set_json(json!({ "status": "cancelled" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri(&availability_uri).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(slots(&body), vec!["09:30:00", "14:00:00"]);

    let req = test::TestRequest::get()
        .uri("/admin/api/bookings/stats")
        .insert_header(("Authorization", ADMIN_AUTH))
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["cancelled"], 1);
}

#[actix_web::test]
async fn public_errors_are_json() {
    let state = test_state().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::public::configure)
            .configure(routes::admin::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/professionals/missing/availability?date=2024-06-03")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["error"], "not_found");

    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .set_json(json!({
            "professional_id": "missing",
            "date": "2024-06-03",
            "time": "09:30",
            "name": "",
            "phone": "12",
            "email": "nope"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["error"], "validation");
}

#[actix_web::test]
async fn calendar_covers_the_whole_month() {
    let state = test_state().await;
    let store = state.store.clone();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::public::configure)
            .configure(routes::admin::configure),
    )
    .await;

    let professional = store
        .create_professional(turnero::store::professionals::NewProfessional {
            name: "Ana".into(),
            specialty: String::new(),
            color: None,
            sort_order: None,
        })
        .await
        .unwrap();
    store
        .add_template_slot(
            &professional.id,
            1,
            chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        )
        .await
        .unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/professionals/{}/calendar?month=2024-06", professional.id))
        .to_request();
    let days: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(days.len(), 30);
    // 2024-06-01 is today, a Saturday with no template; the 2nd is a Sunday.
    assert_eq!(days[0]["state"], "unconfigured");
    assert_eq!(days[1]["state"], "non_working_day");
    assert_eq!(days[2]["date"], "2024-06-03");
    assert_eq!(days[2]["bookable"], true);

    let req = test::TestRequest::get()
        .uri(&format!("/api/professionals/{}/calendar?month=June", professional.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}
