//! In-process stub of the generation backend.
//!
//! Serves the three endpoints the client uses on `127.0.0.1:0` with
//! scripted behaviour, and records what it received.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Scripted backend behaviour plus observed traffic.
pub struct StubState {
    /// Status and raw body returned by `POST /c/prompt`.
    pub create_status: StatusCode,
    pub create_body: String,
    /// Prompts received by `POST /c/prompt`.
    pub received_prompts: Vec<String>,
    /// Ids the status endpoints recognise; others get a 404.
    pub known_ids: Vec<String>,
    /// Plan payload, served once `plan_polls` exceeds `plan_ready_after`.
    pub plan: Option<String>,
    pub plan_ready_after: u32,
    pub plan_polls: u32,
    /// Video URL, served once `video_polls` exceeds `video_ready_after`.
    pub video: Option<String>,
    pub video_ready_after: u32,
    pub video_polls: u32,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            create_status: StatusCode::OK,
            create_body: json!({ "status": "received", "id": "abc123" }).to_string(),
            received_prompts: Vec::new(),
            known_ids: vec!["abc123".to_string()],
            plan: None,
            plan_ready_after: 0,
            plan_polls: 0,
            video: None,
            video_ready_after: 0,
            video_polls: 0,
        }
    }
}

pub type SharedStub = Arc<Mutex<StubState>>;

/// A running stub server.
pub struct StubBackend {
    pub base_url: String,
    pub state: SharedStub,
}

impl StubBackend {
    /// Start a stub server with the given initial state.
    pub async fn start(state: StubState) -> Self {
        let state = Arc::new(Mutex::new(state));

        let app = Router::new()
            .route("/c/prompt", post(create_prompt).get(get_plan))
            .route("/c/cloudinary_url", get(get_video))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut StubState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

/// Base URL of a port that is not listening.
pub async fn dead_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let addr = listener.local_addr().expect("probe local addr");
    drop(listener);
    format!("http://{addr}")
}

async fn create_prompt(State(state): State<SharedStub>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    if let Some(prompt) = body.get("prompt").and_then(Value::as_str) {
        state.received_prompts.push(prompt.to_string());
    }
    (state.create_status, state.create_body.clone()).into_response()
}

async fn get_plan(
    State(state): State<SharedStub>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if !is_known(&state, &params) {
        return not_found();
    }
    state.plan_polls += 1;
    let plan = if state.plan_polls > state.plan_ready_after {
        state.plan.clone()
    } else {
        None
    };
    Json(json!({ "ai_generated_prompt": plan })).into_response()
}

async fn get_video(
    State(state): State<SharedStub>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if !is_known(&state, &params) {
        return not_found();
    }
    state.video_polls += 1;
    let video = if state.video_polls > state.video_ready_after {
        state.video.clone()
    } else {
        None
    };
    Json(json!({ "cloudinary_url": video })).into_response()
}

fn is_known(state: &StubState, params: &HashMap<String, String>) -> bool {
    params
        .get("id")
        .is_some_and(|id| state.known_ids.iter().any(|known| known == id))
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Prompt not found" })),
    )
        .into_response()
}
