//! HTTP front end.
//!
//! | Method | Path             | Body                                   | Response              |
//! |--------|------------------|----------------------------------------|-----------------------|
//! | GET    | `/health`        | -                                      | `{"status":"ok"}`     |
//! | GET    | `/voices`        | -                                      | `{"voices":[…]}`      |
//! | POST   | `/voices/{name}` | `{"clips":["<base64 wav>", …]}`        | `201` + profile JSON  |
//! | POST   | `/generate`      | `{"voice":"…","text":"…","seed":123?}` | `audio/wav` bytes     |
//!
//! Generation blocks on the engine, so it runs on tokio's blocking pool.
//! Generations are serialized through one lock: requests for the same voice
//! would otherwise write the same output files at the same time.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    error::{GenerationError, VoiceError},
    request::{GenerationRequest, Generator},
    voice::{source_from_config, VoiceSource, VoiceStore},
};

/// Everything the handlers share.
pub struct AppState {
    generator: Generator,
    voices: Box<dyn VoiceSource>,
    /// `None` when voices come from a fixed map, which cannot take uploads.
    store: Option<VoiceStore>,
    generation: Mutex<()>,
}

impl AppState {
    pub fn new(generator: Generator, config: &Config) -> Self {
        let store = config
            .fixed_voices
            .is_empty()
            .then(|| VoiceStore::new(&config.voices_dir, config.reference_clips));
        Self {
            generator,
            voices: source_from_config(config),
            store,
            generation: Mutex::new(()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// An error rendered as `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        let status = match &err {
            GenerationError::EmptyText => StatusCode::BAD_REQUEST,
            GenerationError::VoiceUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            GenerationError::SynthesisFailed { .. }
            | GenerationError::Io { .. }
            | GenerationError::Audio(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        let status = match &err {
            VoiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            VoiceError::InvalidName(_)
            | VoiceError::WrongClipCount { .. }
            | VoiceError::BadClip { .. } => StatusCode::BAD_REQUEST,
            VoiceError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateBody {
    voice: String,
    text: String,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UploadBody {
    clips: Vec<String>,
}

#[derive(Debug, Serialize)]
struct VoiceCreated {
    name: String,
    dir: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_voices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let voices = state.voices.list()?;
    Ok(Json(json!({ "voices": voices })))
}

async fn add_voice(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<UploadBody>,
) -> Result<(StatusCode, Json<VoiceCreated>), ApiError> {
    let Some(store) = state.store.clone() else {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "voices come from a fixed map; uploads are disabled",
        ));
    };

    let clips = body
        .clips
        .iter()
        .enumerate()
        .map(|(i, clip)| {
            BASE64
                .decode(clip)
                .map_err(|e| {
                    let message = format!("clip {i} is not valid base64: {e}");
                    ApiError::new(StatusCode::BAD_REQUEST, message)
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let profile = tokio::task::spawn_blocking(move || store.add_voice(&name, &clips))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    Ok((
        StatusCode::CREATED,
        Json(VoiceCreated { name: profile.name, dir: profile.dir.display().to_string() }),
    ))
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateBody>,
) -> Result<Response, ApiError> {
    let voice = state.voices.resolve(&body.voice)?;
    let mut request = GenerationRequest::new(voice, body.text)?;
    if let Some(seed) = body.seed {
        request = request.with_seed(seed);
    }

    let _turn = state.generation.lock().await;
    let worker = Arc::clone(&state);
    let (segments, bytes) = tokio::task::spawn_blocking(move || {
        let combined = worker.generator.generate(&request)?;
        let bytes = std::fs::read(&combined.path)
            .map_err(|e| GenerationError::Io { path: combined.path.clone(), source: e })?;
        Ok::<_, GenerationError>((combined.segment_paths.len(), bytes))
    })
    .await
    .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (header::HeaderName::from_static("x-segments"), segments.to_string()),
        ],
        bytes,
    )
        .into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Router / serve
// ─────────────────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/voices", get(list_voices))
        .route("/voices/{name}", post(add_voice))
        .route("/generate", post(generate))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{write_wav, Waveform, SAMPLE_RATE},
        engine::{SpeechEngine, SynthesisParams},
        error::EngineError,
    };
    use axum::{body::Body, http::Request};
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    struct ToneEngine;

    impl SpeechEngine for ToneEngine {
        fn synthesize(&self, p: &SynthesisParams<'_>) -> Result<Waveform, EngineError> {
            Ok(Waveform::new(vec![0.25; p.text.len() * 100], SAMPLE_RATE))
        }
    }

    fn wav_b64() -> String {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_wav(&path, &Waveform::new(vec![0.1; 480], SAMPLE_RATE)).unwrap();
        BASE64.encode(std::fs::read(path).unwrap())
    }

    fn app() -> (TempDir, Router) {
        let dir = tempdir().unwrap();
        let config = Config {
            results_root: dir.path().join("results"),
            voices_dir: dir.path().join("voices"),
            ..Config::default()
        };
        let generator = Generator::new(Arc::new(ToneEngine), &config);
        let state = Arc::new(AppState::new(generator, &config));
        (dir, router(state))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (_dir, app) = app();
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_then_list_then_generate() {
        let (dir, app) = app();

        let resp = app
            .clone()
            .oneshot(post_json("/voices/martin", json!({ "clips": [wav_b64(), wav_b64()] })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/voices").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(resp).await, json!({ "voices": ["martin"] }));

        let resp = app
            .oneshot(post_json(
                "/generate",
                json!({
                    "voice": "martin",
                    "text": "Hello there|General Kenobi",
                    "seed": 1_700_000_000u64,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "audio/wav");
        assert_eq!(resp.headers()["x-segments"], "2");
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let out = dir.path().join("results/longform/martin");
        assert!(out.join("0.wav").exists());
        assert!(out.join("1.wav").exists());
        assert!(out.join("combined.wav").exists());
    }

    #[tokio::test]
    async fn upload_with_one_clip_is_bad_request() {
        let (_dir, app) = app();
        let resp = app
            .oneshot(post_json("/voices/martin", json!({ "clips": [wav_b64()] })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(resp).await["error"].as_str().unwrap().contains("exactly 2"));
    }

    #[tokio::test]
    async fn unknown_voice_is_not_found() {
        let (_dir, app) = app();
        let resp = app
            .oneshot(post_json("/generate", json!({ "voice": "nobody", "text": "hi" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_text_is_bad_request() {
        let (dir, app) = app();
        std::fs::create_dir_all(dir.path().join("voices/martin")).unwrap();
        let resp = app
            .oneshot(post_json("/generate", json!({ "voice": "martin", "text": "   " })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn voice_without_clips_is_unprocessable() {
        let (dir, app) = app();
        std::fs::create_dir_all(dir.path().join("voices/empty")).unwrap();
        let resp = app
            .oneshot(post_json("/generate", json!({ "voice": "empty", "text": "hi" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!dir.path().join("results/longform/empty").exists());
    }
}
