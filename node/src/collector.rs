//! In-process stand-in for the remote collector: accepts telemetry and serves
//! the per-user settings document.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use roomnode_common::{settings::parse_settings, TelemetryPayload, UserSettings};

pub const TELEMETRY_PATH: &str = "/api/telemetry";
pub const LATEST_TELEMETRY_PATH: &str = "/api/telemetry/latest";
pub const SETTINGS_PATH: &str = "/api/settings";

const HISTORY_LIMIT: usize = 64;

#[derive(Clone)]
pub struct CollectorState {
    readings: Arc<Mutex<VecDeque<TelemetryPayload>>>,
    settings: Arc<Mutex<UserSettings>>,
    settings_path: Option<Arc<PathBuf>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct Accepted {
    accepted: bool,
    stored: usize,
}

impl CollectorState {
    pub fn new(settings: UserSettings, settings_path: Option<PathBuf>) -> Self {
        Self {
            readings: Arc::new(Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT))),
            settings: Arc::new(Mutex::new(settings)),
            settings_path: settings_path.map(Arc::new),
        }
    }
}

pub fn router(state: CollectorState) -> Router {
    Router::new()
        .route(
            TELEMETRY_PATH,
            post(handle_post_telemetry).get(handle_get_history),
        )
        .route(LATEST_TELEMETRY_PATH, get(handle_get_latest))
        .route(
            SETTINGS_PATH,
            get(handle_get_settings).put(handle_put_settings),
        )
        .with_state(state)
}

/// Reads `settings.json` next to the runtime config, if there is one.
pub async fn load_settings(path: &Path) -> anyhow::Result<Option<UserSettings>> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(Some(parse_settings(&raw)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn handle_post_telemetry(
    State(state): State<CollectorState>,
    Json(payload): Json<TelemetryPayload>,
) -> impl IntoResponse {
    info!(
        "telemetry: {:.2}°C presence={} at {}",
        payload.temperature, payload.presence, payload.datetime
    );

    let mut readings = state.readings.lock().await;
    if readings.len() == HISTORY_LIMIT {
        readings.pop_front();
    }
    readings.push_back(payload);

    Json(Accepted {
        accepted: true,
        stored: readings.len(),
    })
}

async fn handle_get_history(State(state): State<CollectorState>) -> impl IntoResponse {
    let readings = state.readings.lock().await;
    Json(readings.iter().cloned().collect::<Vec<_>>())
}

async fn handle_get_latest(State(state): State<CollectorState>) -> axum::response::Response {
    match state.readings.lock().await.back() {
        Some(latest) => Json(latest.clone()).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No telemetry received yet"),
    }
}

async fn handle_get_settings(State(state): State<CollectorState>) -> impl IntoResponse {
    Json(state.settings.lock().await.clone())
}

async fn handle_put_settings(
    State(state): State<CollectorState>,
    body: Bytes,
) -> axum::response::Response {
    let settings = match parse_settings(&body) {
        Ok(settings) => settings,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    if let Some(path) = state.settings_path.as_deref() {
        if let Err(err) = save_settings(path, &settings).await {
            warn!("failed to persist settings: {err:#}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to persist settings",
            );
        }
    }

    info!(
        "settings updated: user_temp={} user_light={} light_time_off={}",
        settings.user_temp, settings.user_light, settings.light_time_off
    );
    *state.settings.lock().await = settings.clone();
    Json(settings).into_response()
}

async fn save_settings(path: &Path, settings: &UserSettings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(settings)?;
    tokio::fs::write(path, payload).await?;
    Ok(())
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
