use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use fritz_api::{app, AppState};
use fritz_booking::HoldPolicy;
use fritz_catalog::FareCalculator;
use fritz_store::memory::fixtures;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> Router {
    let store = Arc::new(fixtures::sample_store());
    app(AppState::new(
        store.clone(),
        store,
        FareCalculator::default(),
        HoldPolicy::default(),
    ))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn search_prices_segments_in_travel_direction() {
    let app = test_app();
    let (status, body) = send(&app, get("/search?from=CN&to=SMT&date=2024-06-01")).await;
    assert_eq!(status, StatusCode::OK);

    let offers = body.as_array().unwrap();
    assert_eq!(offers.len(), 2);

    let argo = offers.iter().find(|o| o["train_id"] == 1).unwrap();
    assert_eq!(argo["price"], 150_000);
    assert_eq!(argo["duration_hm"], "2j 30m");
    assert_eq!(argo["departure"], "11:05:00");
    assert_eq!(argo["arrival"], "13:30:00");
    assert_eq!(argo["seats_available"], 8);

    let kertajaya = offers.iter().find(|o| o["train_id"] == 2).unwrap();
    assert_eq!(kertajaya["price"], 49_000);
    assert_eq!(kertajaya["duration_hm"], "2j 40m");
}

#[tokio::test]
async fn search_requires_both_stations() {
    let app = test_app();
    let (status, body) = send(&app, get("/search?from=CN")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("'from' and 'to'"));

    let (status, body) = send(&app, get("/search?from=SBI&to=ZZZ&date=2024-06-01")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn hold_conflict_names_taken_seats() {
    let app = test_app();
    let hold = json!({ "train_id": 1, "travel_date": "2024-06-01", "seat_ids": [1, 2] });
    let (status, body) = send(&app, post("/reservations/hold", hold)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["hold_code"].as_str().unwrap().starts_with("HOLD-"));
    assert_eq!(body["held_seat_ids"], json!([1, 2]));
    assert_eq!(body["expires_at"], Value::Null);

    let again = json!({ "train_id": 1, "travel_date": "2024-06-01", "seat_ids": [2, 3] });
    let (status, body) = send(&app, post("/reservations/hold", again)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["conflicting_seat_ids"], json!([2]));
    assert_eq!(body["conflicting_seat_numbers"], json!(["B1"]));
    assert_eq!(body["conflict_reasons"], json!(["held"]));

    let (_, seats) = send(&app, get("/trains/1/seats?date=2024-06-01")).await;
    assert_eq!(seats["booked"], 2);
    assert_eq!(seats["available"], 6);
    assert_eq!(seats["per_car"]["Eksekutif 1"].as_array().unwrap().len(), 4);
    assert_eq!(seats["per_car"]["Eksekutif 1"][2]["occupied"], false);
}

#[tokio::test]
async fn hold_confirm_and_look_up_booking() {
    let app = test_app();
    let hold = json!({
        "train_id": 1,
        "travel_date": "2024-06-01",
        "seat_ids": [5, 6],
        "seat_gender_hints": { "5": "female" }
    });
    let (_, held) = send(&app, post("/reservations/hold", hold)).await;

    let confirm = json!({
        "train_id": 1,
        "travel_date": "2024-06-01",
        "seat_ids": [5, 6],
        "passengers": [
            { "name": "Ayu", "id_number": "3174010101900001", "gender": "female" },
            { "name": "Bayu", "id_number": "3174010101900002" }
        ],
        "total_price": 300_000,
        "hold_code": held["hold_code"]
    });
    let (status, receipt) = send(&app, post("/reservations/confirm", confirm)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["price_per_seat"], 150_000);
    assert_eq!(receipt["promoted_seat_ids"], json!([5, 6]));

    let code = receipt["booking_code"].as_str().unwrap();
    let (status, history) = send(&app, get(&format!("/bookings/{}", code))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total_price"], 300_000);
    let rows = history["reservations"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["car_name"], "Eksekutif 2");
    assert_eq!(rows[0]["passenger_id_number"], "3174010101900001");

    let (_, seats) = send(&app, get("/trains/1/seats?date=2024-06-01")).await;
    assert_eq!(seats["per_car"]["Eksekutif 2"][0]["gender"], "female");
    assert_eq!(seats["per_car"]["Eksekutif 1"][0]["gender"], Value::Null);
}

#[tokio::test]
async fn release_frees_held_seats_only() {
    let app = test_app();
    let hold = json!({ "train_id": 1, "travel_date": "2024-06-01", "seat_ids": [7] });
    send(&app, post("/reservations/hold", hold)).await;

    let release = json!({ "travel_date": "2024-06-01", "seat_ids": [7, 8] });
    let (status, body) = send(&app, post("/reservations/release", release.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released_seat_ids"], json!([7]));

    let (_, body) = send(&app, post("/reservations/release", release)).await;
    assert_eq!(body["released_seat_ids"], json!([]));
}

#[tokio::test]
async fn unknown_resources_are_reported() {
    let app = test_app();
    let (status, _) = send(&app, get("/bookings/BK-DOES-NOT-EXIST")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/trains/99/seats?date=2024-06-01")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let confirm = json!({
        "train_id": 1,
        "travel_date": "2024-06-01",
        "seat_ids": [1],
        "passengers": [],
        "total_price": 10_000
    });
    let (status, _) = send(&app, post("/reservations/confirm", confirm)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn confirm_reports_taken_booking_code_and_missing_hold_code() {
    let app = test_app();
    let confirm = |seat: i64| {
        json!({
            "train_id": 1,
            "travel_date": "2024-06-01",
            "seat_ids": [seat],
            "passengers": [{ "name": "Ayu", "id_number": "3174010101900001" }],
            "total_price": 150_000,
            "booking_code": "TRIP-1"
        })
    };
    let (status, _) = send(&app, post("/reservations/confirm", confirm(1))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, post("/reservations/confirm", confirm(2))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("TRIP-1"));

    let hold = json!({ "train_id": 1, "travel_date": "2024-06-01", "seat_ids": [3] });
    send(&app, post("/reservations/hold", hold)).await;
    let mut direct = confirm(3);
    direct["booking_code"] = Value::Null;
    let (status, body) = send(&app, post("/reservations/confirm", direct)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["conflict_reasons"], json!(["held_under_other_code"]));
    assert!(body["error"].as_str().unwrap().contains("hold_code"));
}
