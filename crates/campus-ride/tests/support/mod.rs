//! In-process stand-in for the campus ride backend.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use campus_ride::workflows::ride::{HttpRideApi, Session};
use serde_json::{json, Value};
use url::Url;

pub const TOKEN: &str = "rider-access-token";

pub fn session() -> Session {
    Session {
        access_token: TOKEN.to_string(),
        refresh_token: "rider-refresh-token".to_string(),
        username: "jdoe".to_string(),
        rider_id: "rider-42".to_string(),
    }
}

#[derive(Default)]
pub struct Backend {
    decision: Mutex<Option<Value>>,
    statuses: Mutex<HashMap<String, VecDeque<&'static str>>>,
    pub created: Mutex<Vec<Value>>,
    pub cancelled: Mutex<Vec<String>>,
}

impl Backend {
    /// Body returned by `rides/create/` for ordinary pickups.
    pub fn decide(&self, decision: Value) {
        *self.decision.lock().expect("decision lock") = Some(decision);
    }

    /// Statuses served to successive polls; the last one repeats.
    pub fn script_statuses(&self, ride: &str, statuses: &[&'static str]) {
        self.statuses
            .lock()
            .expect("statuses lock")
            .insert(ride.to_string(), statuses.iter().copied().collect());
    }
}

pub struct TestServer {
    pub backend: Arc<Backend>,
    pub base: Url,
}

impl TestServer {
    pub fn api(&self) -> HttpRideApi {
        self.api_with_timeout(Duration::from_secs(2))
    }

    pub fn api_with_timeout(&self, timeout: Duration) -> HttpRideApi {
        HttpRideApi::new(self.base.clone(), timeout, Duration::from_millis(10))
            .expect("client builds")
    }
}

pub async fn spawn_backend() -> TestServer {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/locations/search/", get(search))
        .route("/api/rides/create/", post(create_ride))
        .route("/api/rides/:ride_id/status/", get(ride_status))
        .route("/api/rides/:ride_id/cancel/", post(cancel_ride))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server runs");
    });

    TestServer {
        backend,
        base: Url::parse(&format!("http://{addr}/api/")).expect("valid base url"),
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {TOKEN}"))
}

async fn search(Query(params): Query<HashMap<String, String>>) -> Response {
    let query = params.get("query").cloned().unwrap_or_default();
    match query.as_str() {
        "slow" => {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Json(json!({ "predictions": [] })).into_response()
        }
        "broken" => (StatusCode::BAD_GATEWAY, "upstream geocoder down").into_response(),
        "garbled" => "not json".into_response(),
        _ => Json(json!({
            "predictions": [
                { "place_id": "p-1", "description": format!("{query} Main Hall") },
                { "place_id": "p-2", "description": format!("{query} Annex") }
            ]
        }))
        .into_response(),
    }
}

async fn create_ride(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Authentication credentials were not provided." })),
        )
            .into_response();
    }
    backend
        .created
        .lock()
        .expect("created lock")
        .push(body.clone());

    match body["pickup_location"].as_str() {
        Some("Closed Lot") => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "outcome": "rejected", "message": "Outside service hours" })),
        )
            .into_response(),
        Some("Crash Site") => {
            (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response()
        }
        _ => {
            let decision = backend
                .decision
                .lock()
                .expect("decision lock")
                .clone()
                .unwrap_or_else(|| {
                    json!({ "outcome": "created", "ride_id": "R1", "driver": "Sam" })
                });
            Json(decision).into_response()
        }
    }
}

async fn ride_status(
    State(backend): State<Arc<Backend>>,
    Path(ride_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut statuses = backend.statuses.lock().expect("statuses lock");
    let Some(queue) = statuses.get_mut(&ride_id) else {
        return (StatusCode::NOT_FOUND, "unknown ride").into_response();
    };
    let current = if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().copied()
    };
    match current {
        Some(status) => Json(json!({ "status": status })).into_response(),
        None => (StatusCode::NOT_FOUND, "no status").into_response(),
    }
}

async fn cancel_ride(
    State(backend): State<Arc<Backend>>,
    Path(ride_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut statuses = backend.statuses.lock().expect("statuses lock");
    let cancellable = statuses
        .get(&ride_id)
        .and_then(|queue| queue.front())
        .is_some_and(|status| matches!(*status, "pending" | "driver_assigned" | "driver_en_route"));
    if !cancellable {
        return (StatusCode::CONFLICT, "ride can no longer be cancelled").into_response();
    }
    statuses.insert(ride_id.clone(), VecDeque::from(["cancelled"]));
    backend
        .cancelled
        .lock()
        .expect("cancelled lock")
        .push(ride_id);
    Json(json!({ "message": "Ride cancelled" })).into_response()
}
