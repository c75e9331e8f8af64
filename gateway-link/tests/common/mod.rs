//! Fake API gateway for integration tests
//!
//! Runs an axum server on its own runtime so blocking clients can call it
//! from plain `#[test]` functions.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};

use gateway_link::EndpointBase;

/// A multipart request as the gateway saw it
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub id: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Default)]
pub struct GatewayState {
    ping_script: Mutex<VecDeque<u16>>,
    pinged_keys: Mutex<Vec<String>>,
    registrations: Mutex<Vec<String>>,
    uploads: Mutex<Vec<RecordedUpload>>,
    authorization: Mutex<Vec<Option<String>>>,
}

pub struct FakeGateway {
    runtime: Option<tokio::runtime::Runtime>,
    addr: SocketAddr,
    state: Arc<GatewayState>,
}

impl FakeGateway {
    pub fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let state = Arc::new(GatewayState::default());

        let app = Router::new()
            .route("/api/1.0.0/ping/:key/None", get(ping))
            .route("/api/1.0.0/register", post(register))
            .route("/categories", get(categories))
            .route("/cases/:id", get(case_by_id))
            .route("/cases/:id/events", post(case_event))
            .route("/malformed", get(malformed).post(malformed))
            .route("/slow", get(slow))
            .route("/secure", get(secure))
            .route("/failing", post(failing))
            .route(
                "/collection-instrument-api/1.0.2/survey_responses/:id",
                post(upload),
            )
            .with_state(state.clone());

        // Bind without block_on so the fixture also works inside #[tokio::test]
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let listener = {
            let _guard = runtime.enter();
            tokio::net::TcpListener::from_std(std_listener).unwrap()
        };
        let addr = listener.local_addr().unwrap();
        runtime.spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            runtime: Some(runtime),
            addr,
            state,
        }
    }

    pub fn base(&self) -> EndpointBase {
        EndpointBase::new("http", "127.0.0.1", self.addr.port())
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Statuses returned by the next pings, in order; 200 once exhausted
    pub fn script_pings(&self, statuses: &[u16]) {
        self.state.ping_script.lock().unwrap().extend(statuses.iter().copied());
    }

    pub fn pinged_keys(&self) -> Vec<String> {
        self.state.pinged_keys.lock().unwrap().clone()
    }

    /// Decoded `details` of every registration post received
    pub fn registrations(&self) -> Vec<Value> {
        self.state
            .registrations
            .lock()
            .unwrap()
            .iter()
            .map(|details| serde_json::from_str(details).unwrap())
            .collect()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn authorization(&self) -> Vec<Option<String>> {
        self.state.authorization.lock().unwrap().clone()
    }

    /// Poll until `check` holds or `timeout` passes
    pub fn wait_for(&self, timeout: Duration, check: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check(self) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        check(self)
    }
}

impl Drop for FakeGateway {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// A local port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn ping(State(state): State<Arc<GatewayState>>, Path(key): Path<String>) -> StatusCode {
    state.pinged_keys.lock().unwrap().push(key);
    let status = state.ping_script.lock().unwrap().pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap()
}

async fn register(
    State(state): State<Arc<GatewayState>>,
    Form(form): Form<HashMap<String, String>>,
) -> StatusCode {
    match form.get("details") {
        Some(details) => {
            state.registrations.lock().unwrap().push(details.clone());
            StatusCode::OK
        }
        None => StatusCode::BAD_REQUEST,
    }
}

async fn categories() -> Json<Value> {
    Json(json!([
        {"name": "EQ_LAUNCH", "description": "Launched", "group": "eq"},
        {"name": "RESPONDENT_ENROLED", "description": "Enrolled", "group": null}
    ]))
}

async fn case_by_id(Path(id): Path<String>) -> impl IntoResponse {
    if id == "known" {
        (StatusCode::OK, Json(json!({"id": "known", "state": "ACTIONABLE"}))).into_response()
    } else {
        (StatusCode::NOT_FOUND, "no such case").into_response()
    }
}

async fn case_event(Path(id): Path<String>, Json(message): Json<Value>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(json!({"caseId": id, "received": message})))
}

async fn malformed() -> impl IntoResponse {
    (StatusCode::OK, "this is not json")
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({"late": true}))
}

async fn secure(State(state): State<Arc<GatewayState>>, headers: HeaderMap) -> Json<Value> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    state.authorization.lock().unwrap().push(authorization);
    Json(json!({"ok": true}))
}

async fn failing() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "database unavailable"})))
}

async fn upload(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    state.uploads.lock().unwrap().push(RecordedUpload {
        id: id.clone(),
        content_type,
        body: body.to_vec(),
    });
    match id.as_str() {
        "fail" => failing().await.into_response(),
        "text" => (StatusCode::OK, "upload received").into_response(),
        _ => StatusCode::OK.into_response(),
    }
}
