use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use image::{Rgba, RgbaImage};
use serde_json::{json, Value};
use spritegen_comfyui::api::ComfyUIApi;
use spritegen_comfyui::poller::PollConfig;
use spritegen_core::imaging::encode_png;
use spritegen_core::preset::GenerationPreset;
use spritegen_pipeline::matting::{BackgroundRemover, PassthroughRemover};
use spritegen_pipeline::writer::AssetWriter;
use spritegen_pipeline::SpriteGenerator;

/// Prompts containing this marker are rejected with HTTP 400.
pub const REJECT_MARKER: &str = "broken";

/// 40x20 canvas, transparent except a 10x10 opaque block at (10, 5).
pub fn sample_image() -> RgbaImage {
    RgbaImage::from_fn(40, 20, |x, y| {
        if (10..20).contains(&x) && (5..15).contains(&y) {
            Rgba([180, 40, 40, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

#[derive(Clone)]
pub struct MockComfy {
    pub submissions: Arc<Mutex<Vec<Value>>>,
    accepted: Arc<AtomicU32>,
    /// When set, finished jobs report no images.
    pub empty_outputs: Arc<AtomicBool>,
    /// When set, finished jobs also report a `temp` preview that `/view`
    /// does not serve.
    pub temp_preview: Arc<AtomicBool>,
    /// Filename reported for the saved image instead of `{prompt_id}.png`.
    pub reported_filename: Arc<Mutex<Option<String>>>,
    png: Arc<Vec<u8>>,
}

impl Default for MockComfy {
    fn default() -> Self {
        Self {
            submissions: Arc::default(),
            accepted: Arc::default(),
            empty_outputs: Arc::default(),
            temp_preview: Arc::default(),
            reported_filename: Arc::default(),
            png: Arc::new(encode_png(&sample_image()).expect("encode sample")),
        }
    }
}

impl MockComfy {
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Workflow graphs submitted so far, including rejected ones.
    pub fn submitted_prompts(&self) -> Vec<Value> {
        self.submissions
            .lock()
            .expect("lock")
            .iter()
            .map(|body| body["prompt"].clone())
            .collect()
    }

    /// Serve the mock on an ephemeral port and return its base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/prompt", post(submit))
            .route("/history/{id}", get(history))
            .route("/view", get(view))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });
        format!("http://{addr}")
    }
}

async fn submit(
    State(mock): State<MockComfy>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let rejected = body.to_string().contains(REJECT_MARKER);
    mock.submissions.lock().expect("lock").push(body);
    if rejected {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "type": "prompt_outputs_failed_validation" } })),
        ));
    }
    let n = mock.accepted.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(Json(json!({ "prompt_id": format!("job-{n}"), "number": n })))
}

async fn history(State(mock): State<MockComfy>, UrlPath(id): UrlPath<String>) -> Json<Value> {
    let filename = mock
        .reported_filename
        .lock()
        .expect("lock")
        .clone()
        .unwrap_or_else(|| format!("{id}.png"));
    let images = if mock.empty_outputs.load(Ordering::SeqCst) {
        json!([])
    } else {
        json!([{ "filename": filename, "subfolder": "", "type": "output" }])
    };
    let mut outputs = json!({ "8": { "images": images } });
    if mock.temp_preview.load(Ordering::SeqCst) {
        // Sorts before "8", so a node-order fallback would see it first.
        outputs["10"] = json!({
            "images": [{ "filename": format!("preview-{id}.png"), "subfolder": "", "type": "temp" }]
        });
    }
    Json(json!({
        id: {
            "outputs": outputs,
            "status": { "status_str": "success", "completed": true }
        }
    }))
}

async fn view(
    State(mock): State<MockComfy>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Vec<u8>, StatusCode> {
    match params.get("filename") {
        Some(name) if name.starts_with("job-") => Ok(mock.png.to_vec()),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

/// Generator wired to `url` with passthrough matting and a fast poll.
pub fn generator(
    url: &str,
    root: &Path,
    commit: bool,
) -> SpriteGenerator<PassthroughRemover> {
    generator_with(url, root, commit, PassthroughRemover)
}

/// Same as [`generator`] with a caller-chosen background remover.
pub fn generator_with<R: BackgroundRemover>(
    url: &str,
    root: &Path,
    commit: bool,
    remover: R,
) -> SpriteGenerator<R> {
    SpriteGenerator::new(
        ComfyUIApi::new(url),
        remover,
        AssetWriter::new(root.join("output"), root.join("assets"), commit),
        PollConfig {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(10),
        },
        GenerationPreset::sdxl_pixel_art(),
    )
}

pub fn read_png(path: &Path) -> RgbaImage {
    let bytes = std::fs::read(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
    spritegen_core::imaging::decode_rgba(&bytes).expect("decode png")
}
