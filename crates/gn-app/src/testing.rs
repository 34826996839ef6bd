//! In-process stand-in for the skybox generation service

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use crate::generator::Sleeper;

pub const JOB_ID: &str = "77";

/// What the status endpoint answers with, in order
#[derive(Debug, Clone)]
pub enum Scripted {
    Status(&'static str),
    NotModified,
    Complete,
    /// Complete, pointing at a square (non-panoramic) image
    CompleteSquare,
    Http(u16),
}

struct MockState {
    base_url: String,
    submit_code: u16,
    script: Mutex<VecDeque<Scripted>>,
    polls: AtomicUsize,
    polled_ids: Mutex<Vec<String>>,
    submissions: Mutex<Vec<Value>>,
    api_keys: Mutex<Vec<String>>,
    panorama: Vec<u8>,
    square: Vec<u8>,
}

pub struct MockService {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockService {
    pub async fn start(script: Vec<Scripted>) -> Self {
        Self::start_with(200, script).await
    }

    pub async fn start_with(submit_code: u16, script: Vec<Scripted>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let state = Arc::new(MockState {
            base_url: base_url.clone(),
            submit_code,
            script: Mutex::new(script.into()),
            polls: AtomicUsize::new(0),
            polled_ids: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            api_keys: Mutex::new(Vec::new()),
            panorama: png_bytes(&panorama()),
            square: png_bytes(&DynamicImage::new_rgb8(4, 4)),
        });

        let app = Router::new()
            .route("/generateSkyboxImage", post(submit))
            .route("/getSkyboxImage", get(status))
            .route("/files/pano.png", get(file))
            .route("/files/square.png", get(square))
            .route("/files/broken.png", get(broken))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, state }
    }

    pub fn polls(&self) -> usize {
        self.state.polls.load(Ordering::SeqCst)
    }

    pub fn polled_ids(&self) -> Vec<String> {
        self.state.polled_ids.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.state.submissions.lock().unwrap().clone()
    }

    pub fn api_keys(&self) -> Vec<String> {
        self.state.api_keys.lock().unwrap().clone()
    }

    pub fn file_url(&self) -> String {
        format!("{}/files/pano.png", self.base_url)
    }
}

pub fn panorama() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(8, 4, |x, y| image::Rgb([x as u8 * 30, y as u8 * 60, 90])))
}

fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}

async fn submit(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.submissions.lock().unwrap().push(body);
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        state.api_keys.lock().unwrap().push(key.to_string());
    }

    match state.submit_code {
        200 => Json(json!({ "id": JOB_ID.parse::<i64>().unwrap(), "status": "pending" })).into_response(),
        code => (StatusCode::from_u16(code).unwrap(), "rejected").into_response(),
    }
}

async fn status(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.polls.fetch_add(1, Ordering::SeqCst);
    state.polled_ids.lock().unwrap().push(params.get("id").cloned().unwrap_or_default());

    // The last scripted answer repeats
    let next = {
        let mut script = state.script.lock().unwrap();
        if script.len() > 1 { script.pop_front() } else { script.front().cloned() }
    };

    match next {
        Some(Scripted::Status(status)) => Json(json!({
            "id": JOB_ID,
            "status": status,
            "progress": 50,
        })).into_response(),
        Some(Scripted::NotModified) => StatusCode::NOT_MODIFIED.into_response(),
        Some(Scripted::Complete) => Json(json!({
            "id": JOB_ID,
            "title": "Mock skybox",
            "status": "complete",
            "file_url": format!("{}/files/pano.png", state.base_url),
            "thumb_url": format!("{}/files/thumb.png", state.base_url),
            "progress": 100,
        })).into_response(),
        Some(Scripted::CompleteSquare) => Json(json!({
            "id": JOB_ID,
            "status": "complete",
            "file_url": format!("{}/files/square.png", state.base_url),
        })).into_response(),
        Some(Scripted::Http(code)) => StatusCode::from_u16(code).unwrap().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn file(State(state): State<Arc<MockState>>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], state.panorama.clone()).into_response()
}

async fn square(State(state): State<Arc<MockState>>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], state.square.clone()).into_response()
}

async fn broken() -> Response {
    ([(header::CONTENT_TYPE, "image/png")], b"not a png".to_vec()).into_response()
}

/// Records requested sleeps and returns immediately
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
