//! HTTP surface: device listing, session control and streaming resources
//!
//! ```text
//! GET  /dmrs                                       reconcile and list renderers
//! POST /stream?action=play&device=<usn>&endpoint=camera
//! POST /stream?action=stop&id=<id>
//! HEAD /{kind}{id}.mp4                             probe a resource
//! GET  /{kind}{id}.mp4                             stream it
//! ```

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::stream::{stream_content, stream_probe};
use crate::coordinator::SessionCoordinator;
use crate::device::DeviceInfo;
use crate::discovery::{Discovery, Reconciler};
use crate::endpoint::ResourceName;
use crate::engine::MediaEngine;

/// Value of the `Server` header on listing responses
pub const SERVER_NAME: &str = concat!("live-media-rs/", env!("CARGO_PKG_VERSION"));

/// The only endpoint kind the control API accepts
pub const CAMERA_ENDPOINT: &str = "camera";

/// Shared state of the HTTP handlers
pub struct AppState<E: MediaEngine, D: Discovery> {
    pub coordinator: Arc<SessionCoordinator<E>>,
    pub reconciler: Arc<Reconciler<E, D>>,
    /// Status protocol port advertised in `Healthport`
    pub health_port: u16,
    pub stream_chunk_size: usize,
}

impl<E: MediaEngine, D: Discovery> Clone for AppState<E, D> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            reconciler: Arc::clone(&self.reconciler),
            health_port: self.health_port,
            stream_chunk_size: self.stream_chunk_size,
        }
    }
}

/// Build the HTTP router
pub fn router<E: MediaEngine, D: Discovery>(state: AppState<E, D>) -> Router {
    Router::new()
        .route("/dmrs", get(list_devices::<E, D>))
        .route("/stream", any(control::<E, D>))
        .route(
            "/{resource}",
            get(stream_content::<E, D>).head(stream_probe::<E, D>),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct DeviceList {
    len: usize,
    dmrs: Vec<DeviceInfo>,
}

async fn list_devices<E: MediaEngine, D: Discovery>(State(state): State<AppState<E, D>>) -> Response {
    match state.reconciler.reconcile_once().await {
        Ok(devices) => {
            let list = DeviceList {
                len: devices.len(),
                dmrs: devices,
            };
            ([(header::SERVER, SERVER_NAME)], Json(list)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Device scan failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// Query parameters of `/stream`
#[derive(Debug, Default, Deserialize)]
pub struct ControlParams {
    pub action: Option<String>,
    pub device: Option<String>,
    pub endpoint: Option<String>,
    pub id: Option<String>,
}

async fn control<E: MediaEngine, D: Discovery>(
    State(state): State<AppState<E, D>>,
    method: Method,
    Query(params): Query<ControlParams>,
) -> Response {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    match params.action.as_deref() {
        Some("play") => play(state, params).await,
        Some("stop") => stop(state, params).await,
        other => {
            tracing::debug!(action = ?other, "Unknown control action");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

async fn play<E: MediaEngine, D: Discovery>(state: AppState<E, D>, params: ControlParams) -> Response {
    let device = match params.device {
        Some(device) if !device.is_empty() => device,
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };
    if params.endpoint.as_deref() != Some(CAMERA_ENDPOINT) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let id = match state.coordinator.create_session(&device, CAMERA_ENDPOINT).await {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(usn = %device, error = %e, "Play rejected");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    let url = state
        .coordinator
        .config()
        .resource_url(&ResourceName::new(CAMERA_ENDPOINT, id));
    let reconciler = Arc::clone(&state.reconciler);
    let usn = device.clone();
    tokio::spawn(async move {
        if let Err(e) = reconciler.discovery().play(&usn, &url).await {
            tracing::warn!(usn = %usn, url = %url, error = %e, "Renderer did not start playback");
        }
    });

    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert("identifier", HeaderValue::from(id));
    headers.insert("healthport", HeaderValue::from(state.health_port));
    response
}

async fn stop<E: MediaEngine, D: Discovery>(state: AppState<E, D>, params: ControlParams) -> Response {
    let Some(id) = params.id.as_deref().and_then(|id| id.parse().ok()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if !state.coordinator.deactivate_session(id).await {
        tracing::debug!(session_id = id, "Stop for unknown session");
    }
    StatusCode::OK.into_response()
}
