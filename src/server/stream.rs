//! Streaming resource handlers
//!
//! Every session publishes `/{kind}{id}.mp4`. A single parametrized route
//! looks the resource up in the coordinator's live table, so a retracted
//! resource answers 404 without any per-session routing state.

use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::sync::oneshot;

use super::http::AppState;
use crate::coordinator::{SessionCoordinator, SessionError};
use crate::discovery::Discovery;
use crate::endpoint::live::{self, CONTENT_TYPE, DLNA_CONTENT_FEATURES, DLNA_TRANSFER_MODE};
use crate::endpoint::ResourceName;
use crate::engine::{MediaEngine, Pipeline};
use crate::session::SessionId;

const CONTENT_FEATURES: HeaderName = HeaderName::from_static("contentfeatures.dlna.org");
const TRANSFER_MODE: HeaderName = HeaderName::from_static("transfermode.dlna.org");

/// Headers shared by HEAD and GET, including the sentinel length
fn apply_live_headers(headers: &mut HeaderMap) {
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(live::probed_length()));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("none"));
    headers.insert(CONTENT_FEATURES, HeaderValue::from_static(DLNA_CONTENT_FEATURES));
    headers.insert(TRANSFER_MODE, HeaderValue::from_static(DLNA_TRANSFER_MODE));
}

/// `HEAD /{kind}{id}.mp4`
///
/// Answers with the streaming headers only. The session is not activated.
pub async fn stream_probe<E: MediaEngine, D: Discovery>(
    State(state): State<AppState<E, D>>,
    Path(resource): Path<String>,
) -> Response {
    let Some(name) = ResourceName::parse(&resource) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if !state.coordinator.probe_stream(&name).await {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut response = StatusCode::OK.into_response();
    apply_live_headers(response.headers_mut());
    response
}

/// `GET /{kind}{id}.mp4`
///
/// Claims the resource, activates the session and streams pipeline output
/// until the client goes away or the pipeline ends.
pub async fn stream_content<E: MediaEngine, D: Discovery>(
    State(state): State<AppState<E, D>>,
    Path(resource): Path<String>,
) -> Response {
    let Some(name) = ResourceName::parse(&resource) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let pipeline = match state.coordinator.open_stream(&name).await {
        Ok(pipeline) => pipeline,
        Err(SessionError::ReaderBusy(id)) => {
            tracing::debug!(session_id = id, "Resource already has a reader");
            return StatusCode::CONFLICT.into_response();
        }
        Err(e) => {
            tracing::debug!(resource = %resource, error = %e, "Stream not available");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    tracing::info!(session_id = name.id, resource = %name, "Streaming to consumer");

    let body = live_body(
        Arc::clone(&state.coordinator),
        name.id,
        pipeline,
        state.stream_chunk_size,
    );

    let mut response = Response::new(Body::from_stream(body));
    apply_live_headers(response.headers_mut());
    response
}

/// Body stream over a pipeline
///
/// The stream state owns the sender half of a one-shot close channel. When
/// the stream ends, fails or is dropped with the connection, the sender is
/// dropped and a watcher task deactivates the session.
pub fn live_body<E: MediaEngine>(
    coordinator: Arc<SessionCoordinator<E>>,
    id: SessionId,
    pipeline: Arc<E::Pipeline>,
    chunk_size: usize,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let (closed_tx, closed_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = closed_rx.await;
        tracing::debug!(session_id = id, "Stream closed");
        coordinator.deactivate_session(id).await;
    });

    futures::stream::unfold((pipeline, closed_tx), move |(pipeline, closed_tx)| async move {
        let mut buf = BytesMut::zeroed(chunk_size);

        match pipeline.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok::<Bytes, io::Error>(buf.freeze()), (pipeline, closed_tx)))
            }
            Err(e) => {
                tracing::debug!(session_id = id, error = %e, "Pipeline read failed");
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;
    use crate::device::{DeviceInfo, DeviceState};
    use crate::test_support::ScriptedEngine;

    async fn wait_for_sessions(coordinator: &SessionCoordinator<ScriptedEngine>, expected: usize) {
        for _ in 0..100 {
            if coordinator.session_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session count never reached {}", expected);
    }

    #[tokio::test]
    async fn test_live_body_ends_and_deactivates() {
        let coordinator = Arc::new(SessionCoordinator::new(ScriptedEngine::new().finite()));
        coordinator.reconcile(&[DeviceInfo::new("usn1", "camA")]).await;
        let id = coordinator.create_session("usn1", "camera").await.unwrap();
        let pipeline = coordinator
            .open_stream(&ResourceName::new("camera", id))
            .await
            .unwrap();

        let body = live_body(Arc::clone(&coordinator), id, pipeline, 1024);
        let chunks: Vec<Bytes> = body.map(|chunk| chunk.unwrap()).collect().await;

        assert_eq!(chunks, vec![Bytes::from_static(b"ftyp"), Bytes::from_static(b"moof")]);
        wait_for_sessions(&coordinator, 0).await;
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Ready);
    }

    #[tokio::test]
    async fn test_dropped_body_deactivates() {
        let engine = ScriptedEngine::new();
        let destroyed = engine.destroyed_counter();
        let coordinator = Arc::new(SessionCoordinator::new(engine));
        coordinator.reconcile(&[DeviceInfo::new("usn1", "camA")]).await;
        let id = coordinator.create_session("usn1", "camera").await.unwrap();
        let pipeline = coordinator
            .open_stream(&ResourceName::new("camera", id))
            .await
            .unwrap();

        let mut body = Box::pin(live_body(Arc::clone(&coordinator), id, pipeline, 2));
        let first = body.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"ft");
        drop(body);

        wait_for_sessions(&coordinator, 0).await;
        assert_eq!(coordinator.query_status(id).await, DeviceState::Down);
        assert_eq!(destroyed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
