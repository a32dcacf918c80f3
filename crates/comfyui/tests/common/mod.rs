use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Prompt ID handed out by the mock `/prompt` endpoint.
pub const PROMPT_ID: &str = "job-1";

/// Output file the mock history reports. The space exercises query encoding.
pub const OUTPUT_FILENAME: &str = "sprite 1.png";
pub const OUTPUT_SUBFOLDER: &str = "sub dir";

/// Bytes served by the mock `/view` endpoint.
pub const OUTPUT_BYTES: &[u8] = b"\x89PNG not really";

/// Requests observed by the mock server.
#[derive(Clone, Default)]
pub struct MockState {
    pub submissions: Arc<Mutex<Vec<Value>>>,
    pub history_polls: Arc<AtomicU32>,
}

impl MockState {
    pub fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().expect("lock").clone()
    }

    pub fn history_polls(&self) -> u32 {
        self.history_polls.load(Ordering::SeqCst)
    }
}

/// Happy-path ComfyUI: accepts every prompt, reports [`PROMPT_ID`] as
/// finished, and serves [`OUTPUT_BYTES`].
pub fn comfy_router(state: MockState) -> Router {
    Router::new()
        .route("/prompt", post(submit))
        .route("/history/{id}", get(history))
        .route("/view", get(view))
        .with_state(state)
}

/// Bind an ephemeral port, serve `app` in the background and return the
/// base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    format!("http://{addr}")
}

async fn submit(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    state.submissions.lock().expect("lock").push(body);
    Json(json!({ "prompt_id": PROMPT_ID, "number": 0, "node_errors": {} }))
}

async fn history(State(state): State<MockState>, Path(id): Path<String>) -> Json<Value> {
    state.history_polls.fetch_add(1, Ordering::SeqCst);
    if id != PROMPT_ID {
        return Json(json!({}));
    }
    Json(json!({
        PROMPT_ID: {
            "outputs": {
                "8": { "images": [
                    { "filename": OUTPUT_FILENAME, "subfolder": OUTPUT_SUBFOLDER, "type": "output" }
                ]}
            },
            "status": { "status_str": "success", "completed": true }
        }
    }))
}

async fn view(Query(params): Query<HashMap<String, String>>) -> Result<Vec<u8>, StatusCode> {
    let matches = params.get("filename").map(String::as_str) == Some(OUTPUT_FILENAME)
        && params.get("subfolder").map(String::as_str) == Some(OUTPUT_SUBFOLDER)
        && params.get("type").map(String::as_str) == Some("output");
    if matches {
        Ok(OUTPUT_BYTES.to_vec())
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
