//! In-crate test fixtures

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;

use crate::device::DeviceInfo;
use crate::discovery::{Discovery, DiscoveryError};
use crate::engine::{EngineError, MediaEngine, Pipeline, PipelineRequest};

/// Engine whose pipelines replay fixed chunks
pub(crate) struct ScriptedEngine {
    fail: bool,
    start_delay: Duration,
    chunks: Vec<Bytes>,
    hold_open: bool,
    destroyed: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self {
            fail: false,
            start_delay: Duration::ZERO,
            chunks: vec![Bytes::from_static(b"ftyp"), Bytes::from_static(b"moof")],
            hold_open: true,
            destroyed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// End the stream after the scripted chunks instead of waiting for destroy
    pub(crate) fn finite(mut self) -> Self {
        self.hold_open = false;
        self
    }

    pub(crate) fn destroyed_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.destroyed)
    }
}

impl MediaEngine for ScriptedEngine {
    type Pipeline = ScriptedPipeline;

    async fn start(&self, request: &PipelineRequest) -> Result<ScriptedPipeline, EngineError> {
        tokio::time::sleep(self.start_delay).await;

        if self.fail {
            return Err(EngineError::Failed(format!("scripted failure for {}", request.session_id)));
        }

        let (closed, _) = watch::channel(false);
        Ok(ScriptedPipeline {
            chunks: Mutex::new(self.chunks.iter().cloned().collect()),
            hold_open: self.hold_open,
            closed,
            destroyed: Arc::clone(&self.destroyed),
        })
    }
}

pub(crate) struct ScriptedPipeline {
    chunks: Mutex<VecDeque<Bytes>>,
    hold_open: bool,
    closed: watch::Sender<bool>,
    destroyed: Arc<AtomicUsize>,
}

impl Pipeline for ScriptedPipeline {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if *self.closed.borrow() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipeline destroyed"));
        }

        let next = self.chunks.lock().map_err(|_| io::ErrorKind::Other)?.pop_front();
        if let Some(chunk) = next {
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            return Ok(n);
        }

        if self.hold_open {
            let mut rx = self.closed.subscribe();
            let _ = rx.wait_for(|closed| *closed).await;
        }
        Ok(0)
    }

    async fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        self.closed.send_replace(true);
    }
}

/// Discovery with a fixed renderer set that records play requests
pub(crate) struct StaticDiscovery {
    devices: Vec<DeviceInfo>,
    failing: AtomicBool,
    played: Mutex<Vec<(String, String)>>,
}

impl StaticDiscovery {
    pub(crate) fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices,
            failing: AtomicBool::new(false),
            played: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn two_cameras() -> Self {
        Self::new(vec![DeviceInfo::new("usn1", "camA"), DeviceInfo::new("usn2", "camB")])
    }

    /// Make every later scan fail
    pub(crate) fn fail_scans(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn played(&self) -> Vec<(String, String)> {
        self.played.lock().map(|played| played.clone()).unwrap_or_default()
    }
}

impl Discovery for StaticDiscovery {
    async fn scan(&self) -> Result<Vec<DeviceInfo>, DiscoveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Io(io::ErrorKind::TimedOut.into()));
        }
        Ok(self.devices.clone())
    }

    async fn play(&self, usn: &str, url: &str) -> Result<(), DiscoveryError> {
        if let Ok(mut played) = self.played.lock() {
            played.push((usn.to_string(), url.to_string()));
        }
        Ok(())
    }
}
