//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use live_media_rs::{
    router, AppState, CoordinatorConfig, DeviceInfo, Discovery, DiscoveryError, EngineError,
    MediaEngine, Pipeline, PipelineRequest, Reconciler, ServerConfig, SessionCoordinator,
    StatusServer,
};

/// Engine producing an endless series of small fragments
pub struct LoopEngine {
    start_delay: Duration,
    destroyed: Arc<AtomicUsize>,
}

impl LoopEngine {
    pub fn new() -> Self {
        Self {
            start_delay: Duration::ZERO,
            destroyed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn destroyed_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.destroyed)
    }
}

impl MediaEngine for LoopEngine {
    type Pipeline = LoopPipeline;

    async fn start(&self, _request: &PipelineRequest) -> Result<LoopPipeline, EngineError> {
        tokio::time::sleep(self.start_delay).await;
        let (closed, _) = watch::channel(false);
        Ok(LoopPipeline {
            closed,
            destroyed: Arc::clone(&self.destroyed),
        })
    }
}

pub struct LoopPipeline {
    closed: watch::Sender<bool>,
    destroyed: Arc<AtomicUsize>,
}

impl Pipeline for LoopPipeline {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if *self.closed.borrow() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipeline destroyed"));
        }

        let mut rx = self.closed.subscribe();
        tokio::select! {
            _ = rx.wait_for(|closed| *closed) => Ok(0),
            _ = tokio::time::sleep(Duration::from_millis(5)) => {
                let fragment = b"moof";
                let n = fragment.len().min(buf.len());
                buf[..n].copy_from_slice(&fragment[..n]);
                Ok(n)
            }
        }
    }

    async fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        self.closed.send_replace(true);
    }
}

/// Discovery with a fixed renderer set
pub struct StaticDiscovery {
    devices: Vec<DeviceInfo>,
    played: Mutex<Vec<(String, String)>>,
}

impl StaticDiscovery {
    pub fn two_cameras() -> Self {
        Self {
            devices: vec![DeviceInfo::new("usn1", "camA"), DeviceInfo::new("usn2", "camB")],
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn played(&self) -> Vec<(String, String)> {
        self.played.lock().unwrap().clone()
    }
}

impl Discovery for StaticDiscovery {
    async fn scan(&self) -> Result<Vec<DeviceInfo>, DiscoveryError> {
        Ok(self.devices.clone())
    }

    async fn play(&self, usn: &str, url: &str) -> Result<(), DiscoveryError> {
        self.played
            .lock()
            .unwrap()
            .push((usn.to_string(), url.to_string()));
        Ok(())
    }
}

/// Both servers running on loopback ports
pub struct TestServers {
    pub http_addr: SocketAddr,
    pub status_addr: SocketAddr,
    pub coordinator: Arc<SessionCoordinator<LoopEngine>>,
    pub reconciler: Arc<Reconciler<LoopEngine, StaticDiscovery>>,
    tasks: Vec<JoinHandle<()>>,
}

impl TestServers {
    pub async fn start(engine: LoopEngine) -> Self {
        let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let status_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http_addr = http_listener.local_addr().unwrap();
        let status_addr = status_listener.local_addr().unwrap();

        let config = ServerConfig::default()
            .http_addr(http_addr)
            .status_addr(status_addr);

        let coordinator = Arc::new(SessionCoordinator::with_config(
            engine,
            CoordinatorConfig::default().content_base(format!("http://{}", http_addr)),
        ));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&coordinator),
            StaticDiscovery::two_cameras(),
        ));

        let app = router(AppState {
            coordinator: Arc::clone(&coordinator),
            reconciler: Arc::clone(&reconciler),
            health_port: config.health_port(),
            stream_chunk_size: config.stream_chunk_size,
        });

        let status_server = StatusServer::new(config, Arc::clone(&coordinator));
        let tasks = vec![
            tokio::spawn(async move { status_server.serve(status_listener).await }),
            tokio::spawn(async move {
                let _ = axum::serve(http_listener, app).await;
            }),
        ];

        Self {
            http_addr,
            status_addr,
            coordinator,
            reconciler,
            tasks,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }

    /// Poll until the coordinator holds `expected` sessions
    pub async fn wait_for_sessions(&self, expected: usize) {
        for _ in 0..200 {
            if self.coordinator.session_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session count never reached {}", expected);
    }
}

impl Drop for TestServers {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
