//! Session lifecycle coordinator
//!
//! The single owner of the device registry, the session store and the table
//! of published resources. All three sit behind one lock so that a device
//! and the session using it always change together.
//!
//! Media engine calls never run under the lock. Creation reserves the device
//! and the ID first, starts the pipeline unlocked, then either commits the
//! handle or repairs the reservation.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::config::CoordinatorConfig;
use super::error::SessionError;
use crate::device::{DeviceInfo, DeviceRegistry, DeviceState};
use crate::endpoint::{EndpointTable, ResourceName};
use crate::engine::{MediaEngine, Pipeline, PipelineRequest};
use crate::session::{SessionId, SessionRecord, SessionStore};

struct Inner<P> {
    devices: DeviceRegistry,
    sessions: SessionStore<P>,
    endpoints: EndpointTable,
}

impl<P> Inner<P> {
    fn activate(&mut self, id: SessionId) -> bool {
        let Some(record) = self.sessions.get_mut(id) else {
            return false;
        };

        if record.activate() {
            tracing::info!(session_id = id, usn = %record.device, "Session running");
        }
        self.devices.set_state(&record.device, DeviceState::Running);
        true
    }
}

/// Reservation made by `create_session` and not yet committed
///
/// Dropping it armed (the creator went away mid-start) deactivates the
/// session from a background task.
struct PendingSession<E: MediaEngine> {
    coordinator: Arc<SessionCoordinator<E>>,
    id: SessionId,
    armed: bool,
}

impl<E: MediaEngine> Drop for PendingSession<E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            return;
        };

        tracing::info!(session_id = self.id, "Session creator went away, releasing");
        let coordinator = Arc::clone(&self.coordinator);
        let id = self.id;
        runtime.spawn(async move {
            coordinator.deactivate_session(id).await;
        });
    }
}

/// Coordinates sessions against the device pool
pub struct SessionCoordinator<E: MediaEngine> {
    inner: Mutex<Inner<E::Pipeline>>,
    engine: E,
    config: CoordinatorConfig,
}

impl<E: MediaEngine> SessionCoordinator<E> {
    /// Create a coordinator with default configuration
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, CoordinatorConfig::default())
    }

    /// Create a coordinator with custom configuration
    pub fn with_config(engine: E, config: CoordinatorConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                devices: DeviceRegistry::new(),
                sessions: SessionStore::new(config.first_session_id),
                endpoints: EndpointTable::new(),
            }),
            engine,
            config,
        }
    }

    /// Get the coordinator configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Apply a discovery snapshot to the device registry
    pub async fn reconcile(&self, discovered: &[DeviceInfo]) {
        self.inner.lock().await.devices.reconcile(discovered);
    }

    /// Check if a device is discovered and free
    pub async fn is_device_available(&self, usn: &str) -> bool {
        self.inner.lock().await.devices.is_available(usn)
    }

    /// Current registry state of a device
    pub async fn device_state(&self, usn: &str) -> DeviceState {
        self.inner.lock().await.devices.state(usn)
    }

    /// Create a session on a device and start its pipeline
    ///
    /// Fails without side effects if the device is not `Ready`. If the
    /// pipeline fails to start, the device goes back to `Ready` and the
    /// session is forgotten. If the returned future is dropped before the
    /// pipeline is committed, the reservation is released in the background.
    pub async fn create_session(
        self: &Arc<Self>,
        device: &str,
        kind: &str,
    ) -> Result<SessionId, SessionError> {
        let id = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;

            if !inner.devices.is_available(device) {
                tracing::debug!(
                    usn = %device,
                    state = %inner.devices.state(device),
                    "Device not available"
                );
                return Err(SessionError::DeviceUnavailable(device.to_string()));
            }

            let id = inner.sessions.allocate_id();
            inner.devices.set_state(device, DeviceState::Initializing);
            inner.sessions.insert(SessionRecord::new(id, device, kind));
            id
        };

        let mut pending = PendingSession {
            coordinator: Arc::clone(self),
            id,
            armed: true,
        };

        tracing::info!(session_id = id, usn = %device, kind = %kind, "Session created");

        let name = ResourceName::new(kind, id);
        let request = PipelineRequest {
            session_id: id,
            device: device.to_string(),
            kind: kind.to_string(),
            destination_url: self.config.resource_url(&name),
        };

        let started = self.engine.start(&request).await;

        let pipeline = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            pending.armed = false;

            match started {
                Ok(pipeline) => match inner.sessions.get_mut(id) {
                    Some(record) => {
                        record.pipeline = Some(Arc::new(pipeline));
                        inner.endpoints.publish(name);
                        return Ok(id);
                    }
                    None => pipeline,
                },
                Err(e) => {
                    if let Some(record) = inner.sessions.remove(id) {
                        inner.devices.set_state(&record.device, DeviceState::Ready);
                    }

                    tracing::warn!(session_id = id, usn = %device, error = %e, "Pipeline start failed");
                    return Err(SessionError::PipelineStart(e));
                }
            }
        };

        // Deactivated while starting; nobody else will ever release this one
        tracing::info!(session_id = id, "Session stopped during startup");
        pipeline.destroy().await;
        Err(SessionError::Cancelled(id))
    }

    /// Mark a session and its device `Running`
    ///
    /// Returns false for unknown sessions.
    pub async fn activate_session(&self, id: SessionId) -> bool {
        self.inner.lock().await.activate(id)
    }

    /// Claim the reader of a published resource and activate its session
    pub async fn open_stream(&self, name: &ResourceName) -> Result<Arc<E::Pipeline>, SessionError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if !inner.endpoints.is_published(name) {
            return Err(SessionError::ResourceNotFound(name.to_string()));
        }

        let record = inner
            .sessions
            .get_mut(name.id)
            .ok_or_else(|| SessionError::ResourceNotFound(name.to_string()))?;

        if record.reader_claimed {
            return Err(SessionError::ReaderBusy(name.id));
        }

        let pipeline = record
            .pipeline
            .clone()
            .ok_or_else(|| SessionError::ResourceNotFound(name.to_string()))?;
        record.reader_claimed = true;

        inner.activate(name.id);
        Ok(pipeline)
    }

    /// Check if a resource is published, without touching the session
    pub async fn probe_stream(&self, name: &ResourceName) -> bool {
        self.inner.lock().await.endpoints.is_published(name)
    }

    /// Tear down a session
    ///
    /// Returns false if the session does not exist; calling this any number
    /// of times, from any task, is safe. The pipeline is destroyed exactly
    /// once, after the lock is released.
    pub async fn deactivate_session(&self, id: SessionId) -> bool {
        let record = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;

            let Some(record) = inner.sessions.remove(id) else {
                return false;
            };
            inner.devices.set_state(&record.device, DeviceState::Ready);
            inner.endpoints.retract(id);
            record
        };

        tracing::info!(
            session_id = id,
            usn = %record.device,
            age_ms = record.age().as_millis() as u64,
            "Session deactivated"
        );

        if let Some(pipeline) = record.pipeline {
            pipeline.destroy().await;
        }

        true
    }

    /// State of a session, refreshing its liveness
    ///
    /// Unknown sessions are `Down`.
    pub async fn query_status(&self, id: SessionId) -> DeviceState {
        let mut inner = self.inner.lock().await;

        match inner.sessions.get_mut(id) {
            Some(record) => {
                record.touch();
                record.phase.device_state()
            }
            None => DeviceState::Down,
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// Deactivate every session idle longer than the liveness timeout
    ///
    /// Returns the number of sessions removed. Does nothing when no timeout
    /// is configured.
    pub async fn reap_expired(&self) -> usize {
        let Some(timeout) = self.config.liveness_timeout else {
            return 0;
        };

        let expired: Vec<SessionId> = {
            let inner = self.inner.lock().await;
            inner
                .sessions
                .iter()
                .filter(|record| record.idle_for() > timeout)
                .map(|record| record.id)
                .collect()
        };

        let mut removed = 0;
        for id in expired {
            tracing::info!(session_id = id, timeout_secs = timeout.as_secs(), "Liveness timeout");
            if self.deactivate_session(id).await {
                removed += 1;
            }
        }
        removed
    }

    /// Spawn the liveness reaper
    ///
    /// Returns None when no liveness timeout is configured.
    pub fn spawn_reaper_task(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.config.liveness_timeout?;

        let coordinator = Arc::clone(self);
        let interval = coordinator.config.reap_interval;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                coordinator.reap_expired().await;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::ScriptedEngine;

    async fn coordinator(engine: ScriptedEngine) -> Arc<SessionCoordinator<ScriptedEngine>> {
        let coordinator = Arc::new(SessionCoordinator::new(engine));
        coordinator
            .reconcile(&[
                DeviceInfo::new("usn1", "camA"),
                DeviceInfo::new("usn2", "camB"),
            ])
            .await;
        coordinator
    }

    #[tokio::test]
    async fn test_round_trip() {
        let engine = ScriptedEngine::new();
        let destroyed = engine.destroyed_counter();
        let coordinator = coordinator(engine).await;

        let id = coordinator.create_session("usn1", "camera").await.unwrap();
        assert_eq!(coordinator.query_status(id).await, DeviceState::Initializing);
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Initializing);
        assert!(!coordinator.is_device_available("usn1").await);

        assert!(coordinator.activate_session(id).await);
        assert_eq!(coordinator.query_status(id).await, DeviceState::Running);
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Running);

        assert!(coordinator.deactivate_session(id).await);
        assert_eq!(coordinator.query_status(id).await, DeviceState::Down);
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Ready);
        assert_eq!(destroyed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ids_strictly_increasing() {
        let coordinator = coordinator(ScriptedEngine::new()).await;

        let mut last = 0;
        for _ in 0..5 {
            let id = coordinator.create_session("usn1", "camera").await.unwrap();
            assert!(id > last);
            last = id;
            coordinator.deactivate_session(id).await;
        }
        assert_eq!(last, 9236 + 4);
    }

    #[tokio::test]
    async fn test_busy_device_rejected() {
        let coordinator = coordinator(ScriptedEngine::new()).await;

        let id = coordinator.create_session("usn1", "camera").await.unwrap();
        let result = coordinator.create_session("usn1", "camera").await;
        assert!(matches!(result, Err(SessionError::DeviceUnavailable(_))));

        // Other device unaffected
        let other = coordinator.create_session("usn2", "camera").await.unwrap();
        assert_ne!(id, other);
        assert_eq!(coordinator.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_device_rejected() {
        let coordinator = coordinator(ScriptedEngine::new()).await;

        let result = coordinator.create_session("usn9", "camera").await;
        assert!(matches!(result, Err(SessionError::DeviceUnavailable(_))));
        assert_eq!(coordinator.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_failure_repairs_state() {
        let coordinator = coordinator(ScriptedEngine::failing()).await;

        let result = coordinator.create_session("usn1", "camera").await;
        assert!(matches!(result, Err(SessionError::PipelineStart(_))));
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Ready);
        assert_eq!(coordinator.session_count().await, 0);
        assert!(
            !coordinator
                .probe_stream(&ResourceName::new("camera", 9236))
                .await
        );
    }

    #[tokio::test]
    async fn test_deactivate_idempotent() {
        let coordinator = coordinator(ScriptedEngine::new()).await;

        assert!(!coordinator.deactivate_session(42).await);

        let id = coordinator.create_session("usn1", "camera").await.unwrap();
        assert!(coordinator.deactivate_session(id).await);
        assert!(!coordinator.deactivate_session(id).await);
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Ready);
    }

    #[tokio::test]
    async fn test_query_unknown_is_down() {
        let coordinator = coordinator(ScriptedEngine::new()).await;
        assert_eq!(coordinator.query_status(1).await, DeviceState::Down);
    }

    #[tokio::test]
    async fn test_open_stream_claims_reader() {
        let coordinator = coordinator(ScriptedEngine::new()).await;
        let id = coordinator.create_session("usn1", "camera").await.unwrap();
        let name = ResourceName::new("camera", id);

        assert!(coordinator.probe_stream(&name).await);
        // Probing does not activate
        assert_eq!(coordinator.query_status(id).await, DeviceState::Initializing);

        assert!(coordinator.open_stream(&name).await.is_ok());
        assert_eq!(coordinator.query_status(id).await, DeviceState::Running);

        let second = coordinator.open_stream(&name).await;
        assert!(matches!(second, Err(SessionError::ReaderBusy(_))));

        let wrong_kind = coordinator
            .open_stream(&ResourceName::new("streaming", id))
            .await;
        assert!(matches!(wrong_kind, Err(SessionError::ResourceNotFound(_))));

        coordinator.deactivate_session(id).await;
        assert!(!coordinator.probe_stream(&name).await);
        assert!(matches!(
            coordinator.open_stream(&name).await,
            Err(SessionError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_during_startup_cancels() {
        let engine = ScriptedEngine::new().start_delay(Duration::from_millis(100));
        let destroyed = engine.destroyed_counter();
        let coordinator = coordinator(engine).await;

        let creating = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.create_session("usn1", "camera").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Initializing);
        assert!(coordinator.deactivate_session(9236).await);

        let result = creating.await.unwrap();
        assert!(matches!(result, Err(SessionError::Cancelled(9236))));
        assert_eq!(destroyed.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Ready);
        assert!(
            !coordinator
                .probe_stream(&ResourceName::new("camera", 9236))
                .await
        );
    }

    #[tokio::test]
    async fn test_abandoned_create_releases_device() {
        let engine = ScriptedEngine::new().start_delay(Duration::from_millis(200));
        let destroyed = engine.destroyed_counter();
        let coordinator = coordinator(engine).await;

        let creating = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.create_session("usn1", "camera").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Initializing);
        creating.abort();
        assert!(creating.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(coordinator.session_count().await, 0);
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Ready);
        assert!(coordinator.is_device_available("usn1").await);
        // The pipeline never finished starting, so there is nothing to destroy
        assert_eq!(destroyed.load(std::sync::atomic::Ordering::SeqCst), 0);

        let id = coordinator.create_session("usn1", "camera").await.unwrap();
        assert_eq!(coordinator.query_status(id).await, DeviceState::Initializing);
    }

    #[tokio::test]
    async fn test_concurrent_creates_single_winner() {
        let engine = ScriptedEngine::new().start_delay(Duration::from_millis(10));
        let coordinator = coordinator(engine).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator.create_session("usn1", "camera").await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(SessionError::DeviceUnavailable(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(coordinator.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_reaper_disabled_by_default() {
        let coordinator = coordinator(ScriptedEngine::new()).await;
        coordinator.create_session("usn1", "camera").await.unwrap();

        assert_eq!(coordinator.reap_expired().await, 0);
        assert!(coordinator.spawn_reaper_task().is_none());
        assert_eq!(coordinator.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_reaper_removes_idle_sessions() {
        let config = CoordinatorConfig::default().liveness_timeout(Duration::from_millis(50));
        let coordinator = Arc::new(SessionCoordinator::with_config(ScriptedEngine::new(), config));
        coordinator
            .reconcile(&[DeviceInfo::new("usn1", "camA"), DeviceInfo::new("usn2", "camB")])
            .await;

        let idle = coordinator.create_session("usn1", "camera").await.unwrap();
        let alive = coordinator.create_session("usn2", "camera").await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        // Status query doubles as keepalive
        coordinator.query_status(alive).await;

        assert_eq!(coordinator.reap_expired().await, 1);
        assert_eq!(coordinator.query_status(idle).await, DeviceState::Down);
        assert_eq!(coordinator.query_status(alive).await, DeviceState::Initializing);
        assert_eq!(coordinator.device_state("usn1").await, DeviceState::Ready);
    }
}
